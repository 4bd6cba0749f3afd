//! # mobconfig - Configuration de Mobify
//!
//! Une configuration est un arbre YAML construit en trois couches :
//!
//! 1. les valeurs par défaut embarquées dans le binaire (`mobify.yaml`) ;
//! 2. le fichier `config.yaml` du répertoire de configuration, fusionné
//!    clé par clé ;
//! 3. les variables `MOBIFY_CONFIG__SECTION__CLE=valeur`, lues comme du YAML.
//!
//! Les clés sont insensibles à la casse. Le résultat est réécrit dans
//! `config.yaml` au chargement.
//!
//! Il n'y a pas d'instance globale : [`Config`] est chargé une fois au
//! démarrage puis passé à ceux qui en ont besoin. Les crates métier ajoutent
//! leurs propres accesseurs par des traits d'extension.
//!
//! ```no_run
//! use mobconfig::Config;
//!
//! let config = Config::load_config("")?;
//! let port = config.get_http_port();
//! config.set_http_port(9000)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, anyhow, bail};
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};
use tracing::{info, warn};

const EMBEDDED_DEFAULTS: &str = include_str!("mobify.yaml");
const CONFIG_FILE: &str = "config.yaml";
const CONFIG_DIR_NAME: &str = ".mobify";

/// Variable désignant le répertoire de configuration
const DIR_VARIABLE: &str = "MOBIFY_CONFIG";
/// Préfixe des surcharges par variable d'environnement
const OVERRIDE_PREFIX: &str = "MOBIFY_CONFIG__";

const DEFAULT_HTTP_PORT: u16 = 8000;
const DEFAULT_BASE_URL: &str = "localhost";
const DEFAULT_LOG_CAPACITY: u64 = 1000;
const DEFAULT_LOG_LEVEL: &str = "INFO";

#[derive(Debug)]
pub struct Config {
    config_dir: Option<PathBuf>,
    file: Option<PathBuf>,
    tree: Mutex<Value>,
}

impl Config {
    /// Choisit le répertoire de configuration
    ///
    /// Dans l'ordre : `directory` s'il est non vide, `$MOBIFY_CONFIG`,
    /// `./.mobify` s'il existe, `~/.mobify` s'il existe, et enfin
    /// `./.mobify`, créé si besoin. Le répertoire retenu doit être lisible
    /// et inscriptible.
    pub fn config_dir(directory: &str) -> Result<PathBuf> {
        let dir = locate_dir(directory);
        ensure_writable_dir(&dir)?;
        Ok(dir)
    }

    /// Charge la configuration depuis `directory` (voir [`Config::config_dir`])
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::config_dir(directory)?;
        let file = config_dir.join(CONFIG_FILE);

        let mut tree = embedded_defaults()?;
        if file.exists() {
            let raw = fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;
            let user: Value = serde_yaml::from_str(&raw)
                .with_context(|| format!("invalid YAML in {}", file.display()))?;
            overlay(&mut tree, lowercase_keys(user));
            info!(file = %file.display(), "Configuration file merged");
        } else {
            info!(file = %file.display(), "No configuration file, using defaults");
        }
        apply_env_overrides(&mut tree);

        let config = Self {
            config_dir: Some(config_dir),
            file: Some(file),
            tree: Mutex::new(tree),
        };
        config.save()?;
        Ok(config)
    }

    /// Construit une configuration en mémoire, sans fichier associé
    ///
    /// Le YAML fourni est fusionné par-dessus la configuration par défaut.
    /// Les variables d'environnement ne sont pas appliquées.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut tree = embedded_defaults()?;
        if !yaml.trim().is_empty() {
            overlay(&mut tree, lowercase_keys(serde_yaml::from_str(yaml)?));
        }

        Ok(Self {
            config_dir: None,
            file: None,
            tree: Mutex::new(tree),
        })
    }

    /// Répertoire de configuration, absent pour une configuration en mémoire
    pub fn directory(&self) -> Option<&Path> {
        self.config_dir.as_deref()
    }

    fn tree(&self) -> Result<MutexGuard<'_, Value>> {
        self.tree
            .lock()
            .map_err(|_| anyhow!("configuration lock poisoned"))
    }

    /// Réécrit `config.yaml` (sans effet pour une configuration en mémoire)
    pub fn save(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&*self.tree()?)?;
        fs::write(file, yaml).with_context(|| format!("cannot write {}", file.display()))
    }

    /// Remplace la valeur à `path` (ex. `&["host", "http_port"]`) et sauvegarde
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        insert_at(&mut *self.tree()?, path, value)?;
        self.save()
    }

    /// Valeur à `path`, erreur si le chemin n'existe pas
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        lookup(&*self.tree()?, path).cloned()
    }

    /// Lit un entier positif, ou `default` si absent ou mal typé
    pub fn get_u64_or(&self, path: &[&str], default: u64) -> u64 {
        match self.get_value(path) {
            Ok(Value::Number(n)) => n.as_u64().unwrap_or(default),
            Ok(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Lit un booléen, ou `default` si absent ou mal typé
    pub fn get_bool_or(&self, path: &[&str], default: bool) -> bool {
        match self.get_value(path) {
            Ok(Value::Bool(b)) => b,
            _ => default,
        }
    }

    /// Lit une chaîne non vide, ou `default`
    pub fn get_string_or(&self, path: &[&str], default: &str) -> String {
        match self.get_value(path) {
            Ok(Value::String(s)) if !s.is_empty() => s,
            _ => default.to_string(),
        }
    }

    /// Lit une liste de chaînes (les éléments non textuels sont ignorés)
    pub fn get_string_list(&self, path: &[&str]) -> Vec<String> {
        match self.get_value(path) {
            Ok(Value::Sequence(seq)) => seq
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    // ============ Section host ============

    /// Nom d'hôte annoncé dans les URLs
    pub fn get_base_url(&self) -> String {
        self.get_string_or(&["host", "base_url"], DEFAULT_BASE_URL)
    }

    /// Port HTTP, 8000 si absent ou hors plage
    pub fn get_http_port(&self) -> u16 {
        let raw = self.get_u64_or(&["host", "http_port"], u64::from(DEFAULT_HTTP_PORT));
        u16::try_from(raw).unwrap_or_else(|_| {
            warn!(port = raw, "Invalid HTTP port, using {}", DEFAULT_HTTP_PORT);
            DEFAULT_HTTP_PORT
        })
    }

    pub fn set_http_port(&self, port: u16) -> Result<()> {
        self.set_value(&["host", "http_port"], Value::from(port))
    }

    /// Origines autorisées pour CORS
    pub fn get_cors_origins(&self) -> Vec<String> {
        self.get_string_list(&["host", "cors_origins"])
    }

    /// Nombre d'entrées gardées par le tampon de logs
    pub fn get_log_cache_size(&self) -> usize {
        self.get_u64_or(&["host", "logger", "buffer_capacity"], DEFAULT_LOG_CAPACITY) as usize
    }

    pub fn get_log_enable_console(&self) -> bool {
        self.get_bool_or(&["host", "logger", "enable_console"], true)
    }

    /// Niveau minimum des logs (`TRACE` à `ERROR`)
    pub fn get_log_min_level(&self) -> String {
        self.get_string_or(&["host", "logger", "min_level"], DEFAULT_LOG_LEVEL)
    }
}

fn embedded_defaults() -> Result<Value> {
    let defaults: Value =
        serde_yaml::from_str(EMBEDDED_DEFAULTS).context("embedded defaults are not valid YAML")?;
    Ok(lowercase_keys(defaults))
}

fn locate_dir(directory: &str) -> PathBuf {
    if !directory.is_empty() {
        return PathBuf::from(directory);
    }
    if let Ok(dir) = env::var(DIR_VARIABLE) {
        info!(variable = DIR_VARIABLE, dir = %dir, "Configuration directory from environment");
        return PathBuf::from(dir);
    }

    let local = PathBuf::from(CONFIG_DIR_NAME);
    let home = dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME));
    [Some(local.clone()), home]
        .into_iter()
        .flatten()
        .find(|candidate| candidate.is_dir())
        .unwrap_or(local)
}

fn ensure_writable_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;

    let probe = dir.join(".mobify-write-check");
    fs::write(&probe, b"ok").with_context(|| format!("{} is not writable", dir.display()))?;
    fs::remove_file(&probe)?;
    Ok(())
}

/// Insère `value` à `path`, en créant les sections intermédiaires
fn insert_at(tree: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((last, parents)) = path.split_last() else {
        *tree = value;
        return Ok(());
    };

    let mut node = tree;
    for key in parents {
        let Value::Mapping(map) = node else {
            bail!("cannot descend into '{}': parent is not a section", key);
        };
        node = map
            .entry(Value::from(key.to_lowercase()))
            .or_insert(Value::Mapping(Mapping::new()));
    }

    match node {
        Value::Mapping(map) => {
            map.insert(Value::from(last.to_lowercase()), value);
            Ok(())
        }
        _ => bail!("cannot set '{}': parent is not a section", last),
    }
}

fn lookup<'a>(tree: &'a Value, path: &[&str]) -> Result<&'a Value> {
    path.iter().try_fold(tree, |node, key| {
        node.as_mapping()
            .and_then(|map| map.get(Value::from(key.to_lowercase())))
            .ok_or_else(|| anyhow!("no configuration value at {}", path.join(".")))
    })
}

fn apply_env_overrides(tree: &mut Value) {
    for (name, raw) in env::vars() {
        let Some(rest) = name.strip_prefix(OVERRIDE_PREFIX) else {
            continue;
        };
        let path: Vec<&str> = rest.split("__").collect();
        if let Err(e) = insert_at(tree, &path, convert_env_value(&raw)) {
            warn!(variable = %name, "Ignoring configuration override: {}", e);
        }
    }
}

/// Une variable est lue comme du YAML (`12`, `true`), sinon comme du texte
fn convert_env_value(raw: &str) -> Value {
    serde_yaml::from_str(raw).unwrap_or_else(|_| Value::from(raw))
}

fn lowercase_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lowercase_keys(v))
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(lowercase_keys).collect()),
        other => other,
    }
}

/// Fusionne `top` dans `base` : sections fusionnées clé par clé, scalaires et
/// listes remplacés
fn overlay(base: &mut Value, top: Value) {
    match (base, top) {
        (Value::Mapping(base), Value::Mapping(top)) => {
            for (key, value) in top {
                match base.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_embedded() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_http_port(), 8000);
        assert_eq!(config.get_log_cache_size(), 1000);
        assert!(config.get_log_enable_console());
        assert_eq!(config.get_u64_or(&["youtube", "cache_ttl_secs"], 0), 600);
    }

    #[test]
    fn test_overlay_merges_mappings() {
        let config = Config::from_yaml_str("host:\n  http_port: 9100\n").unwrap();
        assert_eq!(config.get_http_port(), 9100);
        // Les clés voisines restent celles par défaut
        assert_eq!(config.get_log_min_level(), "INFO");
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let config = Config::from_yaml_str("HOST:\n  HTTP_PORT: 7000\n").unwrap();
        assert_eq!(
            config.get_value(&["Host", "Http_Port"]).unwrap(),
            Value::from(7000)
        );
    }

    #[test]
    fn test_missing_path_is_an_error() {
        let config = Config::from_yaml_str("").unwrap();
        assert!(config.get_value(&["nope", "nothing"]).is_err());
        assert_eq!(config.get_u64_or(&["nope"], 42), 42);
    }

    #[test]
    fn test_set_value_in_memory() {
        let config = Config::from_yaml_str("").unwrap();
        config.set_value(&["relay", "chunk_size"], Value::from(4096)).unwrap();
        assert_eq!(config.get_u64_or(&["relay", "chunk_size"], 0), 4096);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        let config = Config::from_yaml_str("host:\n  http_port: 70000\n").unwrap();
        assert_eq!(config.get_http_port(), DEFAULT_HTTP_PORT);
    }

    #[test]
    fn test_env_value_conversion() {
        assert_eq!(convert_env_value("12"), Value::from(12));
        assert_eq!(convert_env_value("true"), Value::Bool(true));
        assert_eq!(convert_env_value("yt-dlp"), Value::String("yt-dlp".into()));
    }

    #[test]
    fn test_set_value_rejects_scalar_parent() {
        let config = Config::from_yaml_str("").unwrap();
        let err = config
            .set_value(&["host", "http_port", "nested"], Value::from(1))
            .unwrap_err();
        assert!(err.to_string().contains("nested"));
    }

    #[test]
    fn test_load_config_writes_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "import:\n  concurrency: 3\n").unwrap();

        let config = Config::load_config(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(config.get_u64_or(&["import", "concurrency"], 0), 3);

        let written = fs::read_to_string(dir.path().join("config.yaml")).unwrap();
        assert!(written.contains("cache_ttl_secs"));
    }

    #[test]
    fn test_config_dir_rejects_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        fs::write(&file, "").unwrap();

        let err = Config::config_dir(file.to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("is not a directory"), "{}", err);
    }
}
