#![allow(dead_code)]

use mobyoutube::{
    Extraction, Extractor, MediaIdentifier, ResolutionCache, ResolutionError, Resolver, Result,
    SearchHit, WorkerPool, YoutubeClient,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Extracteur factice : compte les appels et la concurrence observée
#[derive(Default)]
pub struct FakeExtractor {
    pub extract_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    delay: Duration,
    /// Identifiants ou fragments de requête qui échouent
    failing: Vec<String>,
    playlist: Vec<SearchHit>,
}

struct InFlight<'a>(&'a FakeExtractor);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, patterns: &[&str]) -> Self {
        self.failing = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_playlist(mut self, entries: Vec<SearchHit>) -> Self {
        self.playlist = entries;
        self
    }

    pub fn extract_calls(&self) -> usize {
        self.extract_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        InFlight(self)
    }

    fn fails(&self, text: &str) -> bool {
        self.failing.iter().any(|p| text.contains(p.as_str()))
    }
}

pub fn hit(id: &str, title: &str) -> SearchHit {
    let id = MediaIdentifier::parse(id).unwrap();
    SearchHit {
        url: id.watch_url(),
        id,
        title: title.to_string(),
        uploader: Some("Uploader".to_string()),
        duration: Some(200),
        thumbnail: None,
    }
}

impl Extractor for FakeExtractor {
    fn extract(&self, id: &MediaIdentifier) -> Result<Extraction> {
        let _guard = self.enter();
        let n = self.extract_calls.fetch_add(1, Ordering::SeqCst);

        if self.fails(id.as_str()) {
            return Err(ResolutionError::NotFound(id.to_string()));
        }
        Ok(Extraction {
            delivery_url: format!("https://cdn.test/{}?n={}", id, n),
            title: Some(format!("Title of {}", id)),
            duration_seconds: Some(240),
            uploader: None,
            thumbnail: None,
        })
    }

    fn search(&self, query: &str, limit: usize, _offset: usize) -> Result<Vec<SearchHit>> {
        let _guard = self.enter();
        self.search_calls.fetch_add(1, Ordering::SeqCst);

        if self.fails(query) {
            return Err(ResolutionError::Unavailable(format!("search failed: {}", query)));
        }

        let id: String = query
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(64)
            .collect();
        Ok(std::iter::repeat_with(|| hit(&id, query)).take(limit).collect())
    }

    fn playlist(&self, url: &str) -> Result<Vec<SearchHit>> {
        let _guard = self.enter();
        if self.fails(url) {
            return Err(ResolutionError::NotFound(url.to_string()));
        }
        Ok(self.playlist.clone())
    }
}

/// Client branché sur un extracteur factice
pub fn client(extractor: Arc<FakeExtractor>, pool_size: usize, ttl: Duration) -> YoutubeClient {
    let pool = WorkerPool::new(pool_size, Duration::from_secs(5), Duration::from_secs(5));
    let resolver = Resolver::new(extractor, pool, ttl);
    YoutubeClient::new(resolver, ResolutionCache::new(ttl, 100))
}
