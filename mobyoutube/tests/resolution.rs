mod common;

use common::{FakeExtractor, client};
use mobyoutube::{MediaIdentifier, ResolutionError};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_second_resolve_within_ttl_hits_cache() -> anyhow::Result<()> {
    let extractor = Arc::new(FakeExtractor::new());
    let client = client(extractor.clone(), 4, Duration::from_secs(600));
    let id = MediaIdentifier::parse("dQw4w9WgXcQ")?;

    let first = client.resolve(&id).await?;
    let second = client.resolve(&id).await?;

    assert_eq!(first.delivery_url, second.delivery_url);
    assert_eq!(first, second);
    assert_eq!(extractor.extract_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_resolve_after_ttl_extracts_again() -> anyhow::Result<()> {
    let extractor = Arc::new(FakeExtractor::new());
    let client = client(extractor.clone(), 4, Duration::from_millis(200));
    let id = MediaIdentifier::parse("abc")?;

    let first = client.resolve(&id).await?;
    tokio::time::sleep(Duration::from_millis(350)).await;
    let second = client.resolve(&id).await?;

    assert_eq!(extractor.extract_calls(), 2);
    assert_ne!(first.delivery_url, second.delivery_url);
    assert!(second.resolved_at > first.resolved_at);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_resolves_share_one_extraction() -> anyhow::Result<()> {
    let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(150)));
    let client = client(extractor.clone(), 8, Duration::from_secs(600));
    let id = MediaIdentifier::parse("abc")?;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let client = client.clone();
            let id = id.clone();
            tokio::spawn(async move { client.resolve(&id).await })
        })
        .collect();

    let mut urls = Vec::new();
    for task in tasks {
        urls.push(task.await??.delivery_url);
    }

    assert_eq!(extractor.extract_calls(), 1);
    assert!(urls.iter().all(|u| u == &urls[0]));
    Ok(())
}

#[tokio::test]
async fn test_distinct_identifiers_are_not_coalesced() -> anyhow::Result<()> {
    let extractor = Arc::new(FakeExtractor::new());
    let client = client(extractor.clone(), 4, Duration::from_secs(600));

    client.resolve(&MediaIdentifier::parse("one")?).await?;
    client.resolve(&MediaIdentifier::parse("two")?).await?;

    assert_eq!(extractor.extract_calls(), 2);
    assert_eq!(client.cache_stats().await.entries, 2);
    Ok(())
}

#[tokio::test]
async fn test_failed_resolution_is_retried_on_next_request() -> anyhow::Result<()> {
    let extractor = Arc::new(FakeExtractor::new().failing(&["gone"]));
    let client = client(extractor.clone(), 4, Duration::from_secs(600));
    let id = MediaIdentifier::parse("gone")?;

    for _ in 0..2 {
        let err = client.resolve(&id).await.unwrap_err();
        assert!(matches!(err, ResolutionError::NotFound(_)));
    }

    assert_eq!(extractor.extract_calls(), 2);
    assert_eq!(client.cache_stats().await.entries, 0);
    Ok(())
}

#[tokio::test]
async fn test_slow_extraction_does_not_stall_other_requests() -> anyhow::Result<()> {
    let extractor = Arc::new(FakeExtractor::new().with_delay(Duration::from_millis(300)));
    let client = client(extractor.clone(), 4, Duration::from_secs(600));
    let id = MediaIdentifier::parse("slow")?;

    let slow = {
        let client = client.clone();
        tokio::spawn(async move { client.resolve(&id).await })
    };

    // Le runtime reste disponible pendant l'extraction bloquante
    let started = std::time::Instant::now();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(started.elapsed() < Duration::from_millis(200));

    slow.await??;
    Ok(())
}
