//! Résolution d'identifiants via l'extracteur
//!
//! Le [`Resolver`] ne lit ni n'écrit le cache : c'est le
//! [`YoutubeClient`](crate::YoutubeClient) qui compose les deux. Aucun échec
//! n'est réessayé ici.

use crate::error::Result;
use crate::extractor::Extractor;
use crate::models::{MediaIdentifier, ResolvedStream, SearchHit};
use crate::pool::WorkerPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Suffixe ajouté aux recherches pour privilégier les versions album
pub const DEFAULT_SEARCH_SUFFIX: &str = "official audio";

#[derive(Clone)]
pub struct Resolver {
    extractor: Arc<dyn Extractor>,
    pool: WorkerPool,
    record_ttl: Duration,
    search_suffix: String,
}

impl Resolver {
    /// # Arguments
    ///
    /// * `record_ttl` - Fenêtre de validité posée sur chaque [`ResolvedStream`]
    pub fn new(extractor: Arc<dyn Extractor>, pool: WorkerPool, record_ttl: Duration) -> Self {
        Self {
            extractor,
            pool,
            record_ttl,
            search_suffix: DEFAULT_SEARCH_SUFFIX.to_string(),
        }
    }

    /// Suffixe de recherche (vide pour le désactiver)
    pub fn with_search_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.search_suffix = suffix.into();
        self
    }

    pub async fn resolve(&self, id: &MediaIdentifier) -> Result<ResolvedStream> {
        let extractor = self.extractor.clone();
        let job_id = id.clone();

        debug!(video_id = %id, "Resolving");
        let extraction = self.pool.run(move || extractor.extract(&job_id)).await?;
        info!(video_id = %id, "Resolved delivery URL");

        Ok(ResolvedStream::new(id.clone(), extraction, self.record_ttl))
    }

    /// Recherche paginée dans le catalogue
    pub async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<SearchHit>> {
        let extractor = self.extractor.clone();
        let query = self.search_query(query);

        debug!(%query, limit, offset, "Searching");
        self.pool
            .run(move || extractor.search(&query, limit, offset))
            .await
    }

    /// Liste les entrées d'une playlist de la plateforme
    pub async fn playlist(&self, url: &str) -> Result<Vec<SearchHit>> {
        let extractor = self.extractor.clone();
        let url = url.to_string();
        self.pool.run(move || extractor.playlist(&url)).await
    }

    /// Ajoute le suffixe sauf si la requête parle déjà d'audio
    pub fn search_query(&self, query: &str) -> String {
        let query = query.trim();
        if self.search_suffix.is_empty() || query.to_lowercase().contains("audio") {
            query.to_string()
        } else {
            format!("{} {}", query, self.search_suffix)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolutionError;
    use crate::models::Extraction;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingExtractor {
        queries: Mutex<Vec<String>>,
    }

    impl Extractor for RecordingExtractor {
        fn extract(&self, id: &MediaIdentifier) -> Result<Extraction> {
            if id.as_str() == "gone" {
                return Err(ResolutionError::NotFound(id.to_string()));
            }
            Ok(Extraction {
                delivery_url: format!("https://cdn.test/{}", id),
                title: Some("Title".into()),
                duration_seconds: Some(180),
                uploader: None,
                thumbnail: None,
            })
        }

        fn search(&self, query: &str, _limit: usize, _offset: usize) -> Result<Vec<SearchHit>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(Vec::new())
        }

        fn playlist(&self, _url: &str) -> Result<Vec<SearchHit>> {
            Ok(Vec::new())
        }
    }

    fn resolver(extractor: Arc<RecordingExtractor>) -> Resolver {
        let pool = WorkerPool::new(2, Duration::from_secs(1), Duration::from_secs(1));
        Resolver::new(extractor, pool, Duration::from_secs(600))
    }

    #[tokio::test]
    async fn test_resolve_builds_record_with_ttl() {
        let resolver = resolver(Arc::new(RecordingExtractor::default()));
        let id = MediaIdentifier::parse("abc").unwrap();

        let record = resolver.resolve(&id).await.unwrap();
        assert_eq!(record.delivery_url, "https://cdn.test/abc");
        assert_eq!(record.duration_seconds, Some(180));
        assert_eq!(
            (record.expires_at - record.resolved_at).num_seconds(),
            600
        );
    }

    #[tokio::test]
    async fn test_resolve_failure_is_reported() {
        let resolver = resolver(Arc::new(RecordingExtractor::default()));
        let id = MediaIdentifier::parse("gone").unwrap();
        let err = resolver.resolve(&id).await.unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[tokio::test]
    async fn test_search_suffix() {
        let extractor = Arc::new(RecordingExtractor::default());
        let resolver = resolver(extractor.clone());

        resolver.search("Daft Punk One More Time", 10, 0).await.unwrap();
        resolver.search("Some Song (Audio)", 10, 0).await.unwrap();

        let queries = extractor.queries.lock().unwrap().clone();
        assert_eq!(
            queries,
            vec![
                "Daft Punk One More Time official audio".to_string(),
                "Some Song (Audio)".to_string(),
            ]
        );
    }

    #[test]
    fn test_empty_suffix_disables_rewrite() {
        let resolver = resolver(Arc::new(RecordingExtractor::default())).with_search_suffix("");
        assert_eq!(resolver.search_query(" x "), "x");
    }
}
