//! Client haut niveau : résolveur + cache
//!
//! C'est le point d'entrée utilisé par les handlers HTTP, le relais audio et
//! les imports par lot. Il est construit une fois au démarrage et partagé
//! (il est `Clone` et bon marché à cloner).

use crate::cache::{CacheStats, ResolutionCache};
use crate::config_ext::YoutubeConfigExt;
use crate::error::Result;
use crate::extractor::{Extractor, YtDlpExtractor};
use crate::models::{MediaIdentifier, ResolvedStream, SearchHit};
use crate::pool::WorkerPool;
use crate::resolver::Resolver;
use mobconfig::Config;
use std::sync::Arc;
use std::time::Duration;

/// Marge laissée à l'extracteur pour tuer son sous-processus avant que le
/// pool ne déclare le délai dépassé
const POOL_TIMEOUT_MARGIN: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct YoutubeClient {
    resolver: Resolver,
    cache: ResolutionCache,
}

impl YoutubeClient {
    pub fn new(resolver: Resolver, cache: ResolutionCache) -> Self {
        Self { resolver, cache }
    }

    /// Construit le client depuis la configuration, avec l'extracteur `yt-dlp`
    pub fn from_config(config: &Config) -> Self {
        let extraction_timeout = config.get_extraction_timeout();
        let extractor = YtDlpExtractor::new(config.get_ytdlp_path())
            .force_ipv4(config.get_youtube_force_ipv4())
            .timeout(extraction_timeout);

        Self::with_extractor(config, Arc::new(extractor))
    }

    /// Comme [`YoutubeClient::from_config`] avec un extracteur fourni
    pub fn with_extractor(config: &Config, extractor: Arc<dyn Extractor>) -> Self {
        let ttl = config.get_resolution_cache_ttl();
        let pool = WorkerPool::new(
            config.get_worker_pool_size(),
            config.get_admission_timeout(),
            config.get_extraction_timeout() + POOL_TIMEOUT_MARGIN,
        );
        let resolver =
            Resolver::new(extractor, pool, ttl).with_search_suffix(config.get_search_suffix());
        let cache = ResolutionCache::new(ttl, config.get_resolution_cache_capacity());

        Self::new(resolver, cache)
    }

    /// Résout un identifiant en passant par le cache
    pub async fn resolve(&self, id: &MediaIdentifier) -> Result<ResolvedStream> {
        self.cache
            .get_or_resolve(id, || {
                let resolver = self.resolver.clone();
                let id = id.clone();
                async move { resolver.resolve(&id).await }
            })
            .await
    }

    pub async fn search(&self, query: &str, limit: usize, offset: usize) -> Result<Vec<SearchHit>> {
        self.resolver.search(query, limit, offset).await
    }

    pub async fn playlist(&self, url: &str) -> Result<Vec<SearchHit>> {
        self.resolver.playlist(url).await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }
}
