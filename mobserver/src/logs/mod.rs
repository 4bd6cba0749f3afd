//! Système de logs de Mobify
//!
//! Installe le subscriber `tracing` global (console + buffer circulaire) et
//! expose le buffer en HTTP :
//!
//! - `GET /log-dump` : dump JSON des dernières entrées
//! - `GET /log-sse` : historique puis flux temps réel en Server-Sent Events

mod buffer_layer;

pub use buffer_layer::BufferLayer;

use std::{
    collections::VecDeque,
    sync::{Arc, RwLock},
    time::SystemTime,
};

use anyhow::Result;
use axum::{
    Json,
    extract::{Query, State},
    response::{
        IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
};
use mobconfig::Config;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Événement capturé par [`BufferLayer`]
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: SystemTime,
    pub level: String,
    pub target: String,
    pub message: String,
}

/// Profondeur du canal live ; un client SSE trop lent saute des entrées
const LIVE_CHANNEL_DEPTH: usize = 1000;

/// Dernières entrées de log, et diffusion des nouvelles
#[derive(Clone)]
pub struct LogState {
    recent: Arc<RwLock<VecDeque<LogEntry>>>,
    capacity: usize,
    live: broadcast::Sender<LogEntry>,
}

impl LogState {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (live, _) = broadcast::channel(LIVE_CHANNEL_DEPTH);
        Self {
            recent: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            live,
        }
    }

    fn push(&self, entry: LogEntry) {
        {
            let mut recent = self.recent.write().unwrap_or_else(|e| e.into_inner());
            while recent.len() >= self.capacity {
                recent.pop_front();
            }
            recent.push_back(entry.clone());
        }
        // Err = aucun abonné
        let _ = self.live.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live.subscribe()
    }

    /// Copie des entrées conservées, de la plus ancienne à la plus récente
    pub fn dump(&self) -> Vec<LogEntry> {
        let recent = self.recent.read().unwrap_or_else(|e| e.into_inner());
        recent.iter().cloned().collect()
    }
}

/// Filtres de `/log-sse` et `/log-dump`
#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    /// Niveau minimum (ERROR, WARN, INFO, DEBUG, TRACE)
    #[serde(default)]
    pub level: Option<String>,
    /// Sous-chaîne cherchée dans le message ou la cible
    #[serde(default)]
    pub search: Option<String>,
}

impl LogQuery {
    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(min) = self.level.as_deref().and_then(parse_level) {
            // ERROR < WARN < INFO < DEBUG < TRACE
            if !parse_level(&entry.level).is_some_and(|level| level <= min) {
                return false;
            }
        }

        self.search.as_deref().is_none_or(|needle| {
            entry.message.contains(needle) || entry.target.contains(needle)
        })
    }
}

fn to_event(entry: &LogEntry) -> Option<Event> {
    serde_json::to_string(entry)
        .ok()
        .map(|json| Event::default().data(json))
}

/// `GET /log-sse` : l'historique filtré, puis les nouvelles entrées
pub async fn log_sse(
    State(state): State<LogState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let mut live = state.subscribe();
    let history = state.dump();

    let stream = async_stream::stream! {
        for entry in history.iter().filter(|e| query.matches(e)) {
            if let Some(event) = to_event(entry) {
                yield Ok::<_, axum::Error>(event);
            }
        }

        loop {
            let entry = match live.recv().await {
                Ok(entry) => entry,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if query.matches(&entry) {
                if let Some(event) = to_event(&entry) {
                    yield Ok::<_, axum::Error>(event);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /log-dump` : les entrées conservées, en JSON
pub async fn log_dump(
    State(state): State<LogState>,
    Query(query): Query<LogQuery>,
) -> impl IntoResponse {
    let mut entries = state.dump();
    entries.retain(|e| query.matches(e));
    Json(entries)
}

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Nombre d'entrées conservées pour `/log-dump` et `/log-sse`
    pub buffer_capacity: usize,
    pub min_level: Level,
    /// Sortie `fmt` sur la console en plus du buffer
    pub enable_console: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            min_level: Level::INFO,
            enable_console: true,
        }
    }
}

impl LoggingOptions {
    /// Lit les options depuis `host.logger.*`
    pub fn from_config(config: &Config) -> Self {
        Self {
            buffer_capacity: config.get_log_cache_size(),
            min_level: parse_level(&config.get_log_min_level()).unwrap_or(Level::INFO),
            enable_console: config.get_log_enable_console(),
        }
    }
}

/// Installe le subscriber global : filtre de niveau, buffer, console
///
/// Échoue si un subscriber global est déjà installé.
pub fn init_logging(options: &LoggingOptions) -> Result<LogState> {
    let state = LogState::new(options.buffer_capacity);
    let console = options
        .enable_console
        .then(|| tracing_subscriber::fmt::layer().with_target(true));

    Registry::default()
        .with(LevelFilter::from_level(options.min_level))
        .with(BufferLayer::new(state.clone()))
        .with(console)
        .try_init()?;

    Ok(state)
}

fn parse_level(raw: &str) -> Option<Level> {
    Level::from_str(raw.trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: &str, message: &str) -> LogEntry {
        LogEntry {
            timestamp: SystemTime::now(),
            level: level.to_string(),
            target: "mobify::test".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_buffer_is_bounded() {
        let state = LogState::new(2);
        state.push(entry("INFO", "a"));
        state.push(entry("INFO", "b"));
        state.push(entry("INFO", "c"));

        let dump = state.dump();
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].message, "b");
        assert_eq!(dump[1].message, "c");
    }

    #[test]
    fn test_level_filter_keeps_more_severe() {
        let q = LogQuery {
            level: Some("warn".to_string()),
            search: None,
        };
        assert!(q.matches(&entry("ERROR", "x")));
        assert!(q.matches(&entry("WARN", "x")));
        assert!(!q.matches(&entry("INFO", "x")));
    }

    #[test]
    fn test_search_filter() {
        let q = LogQuery {
            level: None,
            search: Some("relay".to_string()),
        };
        assert!(q.matches(&entry("INFO", "relay aborted")));
        assert!(!q.matches(&entry("INFO", "resolved")));
    }

    #[test]
    fn test_options_from_config() {
        let config = Config::from_yaml_str(
            "host:\n  logger:\n    min_level: debug\n    buffer_capacity: 10\n    enable_console: false\n",
        )
        .unwrap();
        let options = LoggingOptions::from_config(&config);
        assert_eq!(options.min_level, Level::DEBUG);
        assert_eq!(options.buffer_capacity, 10);
        assert!(!options.enable_console);
    }
}
