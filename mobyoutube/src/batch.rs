//! Résolution par lot des pistes d'un import
//!
//! Au plus `concurrency_cap` pistes sont en cours à un instant donné. Le
//! résultat est positionnel : le slot `i` correspond à la piste `i` de
//! l'entrée, quel que soit l'ordre de complétion. Un échec vide le slot sans
//! interrompre le lot.
//!
//! Ce plafond se compose avec celui du [`WorkerPool`](crate::WorkerPool) :
//! la concurrence effective vers l'extracteur est le minimum des deux.

use crate::client::YoutubeClient;
use crate::models::{BatchResult, ImportedTrack, TrackMetadata};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct BatchResolver {
    client: YoutubeClient,
}

impl BatchResolver {
    pub fn new(client: YoutubeClient) -> Self {
        Self { client }
    }

    pub async fn resolve_all(&self, items: &[TrackMetadata], concurrency_cap: usize) -> BatchResult {
        let cap = concurrency_cap.max(1);
        info!(items = items.len(), cap, "Starting batch resolution");

        let pending: Vec<_> = items
            .iter()
            .enumerate()
            .map(|(position, item)| async move { (position, self.resolve_item(item, position).await) })
            .collect();
        let resolved: Vec<(usize, Option<ImportedTrack>)> = stream::iter(pending)
            .buffer_unordered(cap)
            .collect()
            .await;

        let mut slots = vec![None; items.len()];
        for (position, track) in resolved {
            slots[position] = track;
        }

        let result = BatchResult::new(slots);
        info!(
            imported = result.imported_count(),
            skipped = result.len() - result.imported_count(),
            "Batch resolution done"
        );
        result
    }

    async fn resolve_item(&self, item: &TrackMetadata, position: usize) -> Option<ImportedTrack> {
        if let Some(id) = &item.identifier {
            return match self.client.resolve(id).await {
                Ok(record) => Some(ImportedTrack {
                    video_id: id.clone(),
                    title: record.title.unwrap_or_else(|| item.title.clone()),
                    uploader: Some(item.artist.clone()).filter(|a| !a.is_empty()),
                    thumbnail: item.thumbnail_url.clone(),
                    duration: record.duration_seconds.or(item.duration_seconds),
                    position,
                }),
                Err(e) => {
                    warn!(position, video_id = %id, kind = e.kind(), "Skipping track: {}", e);
                    None
                }
            };
        }

        let Some(query) = item.search_query() else {
            debug!(position, "Skipping track without title or artist");
            return None;
        };

        match self.client.search(&query, 1, 0).await {
            Ok(hits) => match hits.into_iter().next() {
                Some(hit) => Some(ImportedTrack::from_hit(hit, position)),
                None => {
                    debug!(position, %query, "No match for track");
                    None
                }
            },
            Err(e) => {
                warn!(position, %query, kind = e.kind(), "Skipping track: {}", e);
                None
            }
        }
    }
}
