//! Cache des résolutions
//!
//! Cache en mémoire avec TTL, clé = identifiant. Seules les résolutions
//! réussies sont conservées. [`ResolutionCache::get_or_resolve`] coalesce les
//! appels concurrents pour une même clé absente : un seul appel résout, les
//! autres attendent son résultat (succès ou échec).

use crate::error::Result;
use crate::models::{MediaIdentifier, ResolvedStream};
use moka::future::Cache as MokaCache;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Validité par défaut d'une résolution (10 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Statistiques exposées par `/cache/stats`
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct CacheStats {
    pub entries: u64,
    pub ttl_secs: u64,
}

#[derive(Clone)]
pub struct ResolutionCache {
    streams: MokaCache<MediaIdentifier, ResolvedStream>,
    ttl: Duration,
}

impl Default for ResolutionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, 1000)
    }
}

impl ResolutionCache {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            streams: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
            ttl,
        }
    }

    /// Récupère une résolution encore valide
    ///
    /// Un enregistrement périmé est retiré et traité comme absent.
    pub async fn get(&self, id: &MediaIdentifier) -> Option<ResolvedStream> {
        let record = self.streams.get(id).await?;
        if record.is_expired() {
            self.streams.invalidate(id).await;
            return None;
        }
        Some(record)
    }

    /// Ajoute ou remplace une résolution
    pub async fn put(&self, id: MediaIdentifier, record: ResolvedStream) {
        self.streams.insert(id, record).await;
    }

    /// Retourne la résolution en cache, ou la calcule avec `resolve`
    ///
    /// Les appels concurrents pour une même clé partagent un seul appel à
    /// `resolve`. Une erreur est transmise à tous les appelants en attente
    /// mais n'est jamais mise en cache.
    pub async fn get_or_resolve<F, Fut>(&self, id: &MediaIdentifier, resolve: F) -> Result<ResolvedStream>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<ResolvedStream>>,
    {
        // Deux tours : moka peut encore rendre un enregistrement dont
        // `expires_at` vient d'être dépassé
        for _ in 0..2 {
            let record = self
                .streams
                .try_get_with(id.clone(), resolve())
                .await
                .map_err(|e| (*e).clone())?;

            if !record.is_expired() {
                return Ok(record);
            }
            debug!(video_id = %id, "Discarding expired resolution");
            self.streams.invalidate(id).await;
        }

        let record = resolve().await?;
        self.put(id.clone(), record.clone()).await;
        Ok(record)
    }

    /// Retourne des statistiques sur le cache
    pub async fn stats(&self) -> CacheStats {
        self.streams.run_pending_tasks().await;
        CacheStats {
            entries: self.streams.entry_count(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::models::Extraction;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: &MediaIdentifier, url: &str, ttl: Duration) -> ResolvedStream {
        ResolvedStream::new(
            id.clone(),
            Extraction {
                delivery_url: url.to_string(),
                title: None,
                duration_seconds: None,
                uploader: None,
                thumbnail: None,
            },
            ttl,
        )
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let cache = ResolutionCache::default();
        let id = MediaIdentifier::parse("abc").unwrap();

        assert!(cache.get(&id).await.is_none());
        cache.put(id.clone(), record(&id, "https://cdn.test/1", DEFAULT_TTL)).await;

        let hit = cache.get(&id).await.unwrap();
        assert_eq!(hit.delivery_url, "https://cdn.test/1");
    }

    #[tokio::test]
    async fn test_expired_record_is_absent_and_removed() {
        let cache = ResolutionCache::default();
        let id = MediaIdentifier::parse("abc").unwrap();

        cache.put(id.clone(), record(&id, "https://cdn.test/1", Duration::ZERO)).await;
        assert!(cache.get(&id).await.is_none());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache = ResolutionCache::default();
        let id = MediaIdentifier::parse("abc").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            let err = cache
                .get_or_resolve(&id, move || {
                    let calls = calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err(ResolutionError::Blocked("bot check".into()))
                    }
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), "blocked");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.get(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_resolution() {
        let cache = ResolutionCache::default();
        let id = MediaIdentifier::parse("abc").unwrap();
        let calls = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let cache = cache.clone();
                let id = id.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    cache
                        .get_or_resolve(&id, || {
                            let calls = calls.clone();
                            let id = id.clone();
                            async move {
                                let n = calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(100)).await;
                                Ok(record(&id, &format!("https://cdn.test/{}", n), DEFAULT_TTL))
                            }
                        })
                        .await
                })
            })
            .collect();

        for task in tasks {
            let record = task.await.unwrap().unwrap();
            assert_eq!(record.delivery_url, "https://cdn.test/0");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
