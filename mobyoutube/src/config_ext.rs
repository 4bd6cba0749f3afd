//! Extension pour lire la configuration YouTube depuis mobconfig
//!
//! Toutes les clés vivent sous `youtube.*`, sauf la concurrence d'import
//! (`import.concurrency`).

use mobconfig::Config;
use std::time::Duration;

use crate::resolver::DEFAULT_SEARCH_SUFFIX;

const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_WORKER_POOL_SIZE: u64 = 4;
const DEFAULT_ADMISSION_TIMEOUT_SECS: u64 = 20;
const DEFAULT_CACHE_TTL_SECS: u64 = 600;
const DEFAULT_CACHE_CAPACITY: u64 = 1000;
const DEFAULT_IMPORT_CONCURRENCY: u64 = 5;

/// Trait d'extension pour les paramètres YouTube de `mobconfig::Config`
///
/// # Exemple
///
/// ```rust,no_run
/// use mobconfig::Config;
/// use mobyoutube::YoutubeConfigExt;
///
/// let config = Config::load_config("")?;
/// let ttl = config.get_resolution_cache_ttl();
/// # Ok::<(), anyhow::Error>(())
/// ```
pub trait YoutubeConfigExt {
    /// Chemin de l'exécutable `yt-dlp`
    fn get_ytdlp_path(&self) -> String;

    /// Force IPv4 pour l'extracteur
    fn get_youtube_force_ipv4(&self) -> bool;

    /// Délai maximal d'une extraction
    fn get_extraction_timeout(&self) -> Duration;

    /// Nombre d'extractions simultanées
    fn get_worker_pool_size(&self) -> usize;

    /// Attente maximale d'une place dans le pool
    fn get_admission_timeout(&self) -> Duration;

    /// Fenêtre de validité des résolutions
    fn get_resolution_cache_ttl(&self) -> Duration;

    fn get_resolution_cache_capacity(&self) -> u64;

    /// Suffixe ajouté aux recherches (vide pour désactiver)
    fn get_search_suffix(&self) -> String;

    /// Nombre de pistes résolues simultanément lors d'un import
    fn get_import_concurrency(&self) -> usize;
}

impl YoutubeConfigExt for Config {
    fn get_ytdlp_path(&self) -> String {
        self.get_string_or(&["youtube", "ytdlp_path"], DEFAULT_YTDLP_PATH)
    }

    fn get_youtube_force_ipv4(&self) -> bool {
        self.get_bool_or(&["youtube", "force_ipv4"], false)
    }

    fn get_extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["youtube", "extraction_timeout_secs"],
            DEFAULT_EXTRACTION_TIMEOUT_SECS,
        ))
    }

    fn get_worker_pool_size(&self) -> usize {
        self.get_u64_or(&["youtube", "worker_pool_size"], DEFAULT_WORKER_POOL_SIZE)
            .max(1) as usize
    }

    fn get_admission_timeout(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(
            &["youtube", "admission_timeout_secs"],
            DEFAULT_ADMISSION_TIMEOUT_SECS,
        ))
    }

    fn get_resolution_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.get_u64_or(&["youtube", "cache_ttl_secs"], DEFAULT_CACHE_TTL_SECS))
    }

    fn get_resolution_cache_capacity(&self) -> u64 {
        self.get_u64_or(&["youtube", "cache_capacity"], DEFAULT_CACHE_CAPACITY)
    }

    fn get_search_suffix(&self) -> String {
        match self.get_value(&["youtube", "search_suffix"]) {
            Ok(serde_yaml::Value::String(s)) => s,
            Ok(serde_yaml::Value::Null) => String::new(),
            _ => DEFAULT_SEARCH_SUFFIX.to_string(),
        }
    }

    fn get_import_concurrency(&self) -> usize {
        self.get_u64_or(&["import", "concurrency"], DEFAULT_IMPORT_CONCURRENCY)
            .max(1) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_ytdlp_path(), "yt-dlp");
        assert!(!config.get_youtube_force_ipv4());
        assert_eq!(config.get_resolution_cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.get_worker_pool_size(), 4);
        assert_eq!(config.get_import_concurrency(), 5);
        assert_eq!(config.get_search_suffix(), "official audio");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_yaml_str(
            "youtube:\n  force_ipv4: true\n  worker_pool_size: 0\n  search_suffix: \"\"\nimport:\n  concurrency: 2\n",
        )
        .unwrap();
        assert!(config.get_youtube_force_ipv4());
        assert_eq!(config.get_worker_pool_size(), 1);
        assert_eq!(config.get_search_suffix(), "");
        assert_eq!(config.get_import_concurrency(), 2);
    }
}
