//! Extension pour lire la configuration du relais depuis mobconfig

use crate::relay::RelayOptions;
use mobconfig::Config;
use std::time::Duration;

/// Trait d'extension pour les paramètres `relay.*` de `mobconfig::Config`
pub trait RelayConfigExt {
    /// User-Agent envoyé à la source amont
    fn get_relay_user_agent(&self) -> String;

    /// Lie les connexions sortantes à une adresse IPv4
    fn get_relay_prefer_ipv4(&self) -> bool;

    fn get_relay_probe_timeout(&self) -> Duration;

    fn get_relay_connect_timeout(&self) -> Duration;

    /// Taille maximale des morceaux envoyés au client
    fn get_relay_chunk_size(&self) -> usize;

    fn get_relay_cache_control(&self) -> String;

    /// Toutes les options du relais
    fn get_relay_options(&self) -> RelayOptions {
        RelayOptions {
            user_agent: self.get_relay_user_agent(),
            prefer_ipv4: self.get_relay_prefer_ipv4(),
            probe_timeout: self.get_relay_probe_timeout(),
            connect_timeout: self.get_relay_connect_timeout(),
            chunk_size: self.get_relay_chunk_size(),
            cache_control: self.get_relay_cache_control(),
        }
    }
}

impl RelayConfigExt for Config {
    fn get_relay_user_agent(&self) -> String {
        self.get_string_or(&["relay", "user_agent"], &RelayOptions::default().user_agent)
    }

    fn get_relay_prefer_ipv4(&self) -> bool {
        self.get_bool_or(&["relay", "prefer_ipv4"], false)
    }

    fn get_relay_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(&["relay", "probe_timeout_secs"], 10))
    }

    fn get_relay_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(&["relay", "connect_timeout_secs"], 10))
    }

    fn get_relay_chunk_size(&self) -> usize {
        self.get_u64_or(&["relay", "chunk_size"], 128 * 1024).max(1) as usize
    }

    fn get_relay_cache_control(&self) -> String {
        self.get_string_or(
            &["relay", "cache_control"],
            &RelayOptions::default().cache_control,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        let options = config.get_relay_options();
        assert_eq!(options.chunk_size, 131072);
        assert_eq!(options.cache_control, "public, max-age=3600");
        assert_eq!(options.probe_timeout, Duration::from_secs(10));
        assert!(!options.prefer_ipv4);
    }

    #[test]
    fn test_relay_overrides() {
        let config =
            Config::from_yaml_str("relay:\n  prefer_ipv4: true\n  chunk_size: 0\n").unwrap();
        assert!(config.get_relay_prefer_ipv4());
        assert_eq!(config.get_relay_chunk_size(), 1);
    }
}
