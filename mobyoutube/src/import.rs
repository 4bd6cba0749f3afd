//! Frontière avec la couche de persistance des imports
//!
//! Mobify ne sait pas où les playlists importées sont stockées : il remet les
//! pistes résolues à un [`ImportSink`]. [`MemoryImportSink`] garde tout en
//! mémoire.

use crate::models::ImportedTrack;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Reçoit les playlists importées
#[async_trait]
pub trait ImportSink: Send + Sync {
    /// Enregistre une playlist et retourne son identifiant
    async fn store_playlist(&self, name: &str, tracks: Vec<ImportedTrack>) -> Result<u64>;
}

/// Playlist conservée par [`MemoryImportSink`]
#[derive(Debug, Clone, Serialize)]
pub struct StoredPlaylist {
    pub id: u64,
    pub name: String,
    pub tracks: Vec<ImportedTrack>,
}

/// Sink en mémoire, utilisé par le binaire et les tests
///
/// ```
/// use mobyoutube::{ImportSink, MemoryImportSink};
///
/// # tokio_test::block_on(async {
/// let sink = MemoryImportSink::new();
/// let id = sink.store_playlist("Road trip", Vec::new()).await.unwrap();
/// assert_eq!(sink.playlist(id).await.unwrap().name, "Road trip");
/// # });
/// ```
#[derive(Debug)]
pub struct MemoryImportSink {
    next_id: AtomicU64,
    playlists: RwLock<Vec<StoredPlaylist>>,
}

impl Default for MemoryImportSink {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryImportSink {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            playlists: RwLock::new(Vec::new()),
        }
    }

    pub async fn playlists(&self) -> Vec<StoredPlaylist> {
        self.playlists.read().await.clone()
    }

    pub async fn playlist(&self, id: u64) -> Option<StoredPlaylist> {
        self.playlists
            .read()
            .await
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }
}

#[async_trait]
impl ImportSink for MemoryImportSink {
    async fn store_playlist(&self, name: &str, tracks: Vec<ImportedTrack>) -> Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.playlists.write().await.push(StoredPlaylist {
            id,
            name: name.to_string(),
            tracks,
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_sink_assigns_ids() {
        let sink = MemoryImportSink::new();
        let first = sink.store_playlist("Road trip", Vec::new()).await.unwrap();
        let second = sink.store_playlist("Focus", Vec::new()).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(sink.playlist(second).await.unwrap().name, "Focus");
        assert_eq!(sink.playlists().await.len(), 2);
    }
}
