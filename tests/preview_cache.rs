//! Preview cache behavior through the public store and service API.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use courtline::application::preview::{
    ComputedPreview, PreviewService, PreviewSource, PreviewSourceError,
};
use courtline::cache::{PreviewArtifact, PreviewCacheConfig, PreviewStore};

fn artifact(url: &str) -> PreviewArtifact {
    PreviewArtifact {
        url: url.to_string(),
        title: Some(format!("Preview of {url}")),
        description: None,
        image_url: None,
    }
}

fn config(max_entries: usize, max_bytes: u64) -> PreviewCacheConfig {
    PreviewCacheConfig {
        max_entries,
        max_bytes,
    }
}

#[test]
fn both_ceilings_apply_on_insert() {
    let store = PreviewStore::new(&config(3, 250));

    assert!(store.set("a", artifact("a"), 100));
    assert!(store.set("b", artifact("b"), 100));
    // Entry ceiling allows a third item, the byte ceiling does not; "a" is
    // the least recently used and must go.
    assert!(store.set("c", artifact("c"), 100));

    assert_eq!(store.len(), 2);
    assert!(store.get("a").is_none());
    assert!(store.get("b").is_some());
    assert!(store.get("c").is_some());

    let stats = store.stats();
    assert_eq!(stats.total_entries, 2);
    assert_eq!(stats.memory_usage_bytes, 200);
}

#[test]
fn reads_protect_entries_from_eviction() {
    let store = PreviewStore::new(&config(3, 1_000));

    assert!(store.set("a", artifact("a"), 10));
    assert!(store.set("b", artifact("b"), 10));
    assert!(store.set("c", artifact("c"), 10));

    // Touch "a" so "b" becomes the eviction candidate.
    assert!(store.get("a").is_some());
    assert!(store.set("d", artifact("d"), 10));

    assert!(store.get("a").is_some());
    assert!(store.get("b").is_none());
    assert!(store.get("c").is_some());
    assert!(store.get("d").is_some());
}

#[test]
fn oversized_artifacts_never_enter_the_cache() {
    let store = PreviewStore::new(&config(4, 100));

    assert!(store.set("small", artifact("small"), 40));
    assert!(!store.set("huge", artifact("huge"), 101));

    // The resident entry survives a rejected insert untouched.
    assert_eq!(store.len(), 1);
    assert!(store.get("small").is_some());
    assert!(store.get("huge").is_none());
}

#[test]
fn clearing_resets_stats() {
    let store = PreviewStore::new(&config(4, 1_000));
    assert!(store.set("a", artifact("a"), 100));
    assert!(store.set("b", artifact("b"), 100));

    store.clear();

    assert!(store.is_empty());
    let stats = store.stats();
    assert_eq!(stats.total_entries, 0);
    assert_eq!(stats.memory_usage_bytes, 0);
    assert_eq!(stats.fill_percentage, 0.0);
}

struct CountingSource {
    computed: AtomicUsize,
}

#[async_trait]
impl PreviewSource for CountingSource {
    async fn compute_preview(&self, key: &str) -> Result<ComputedPreview, PreviewSourceError> {
        self.computed.fetch_add(1, Ordering::SeqCst);
        Ok(ComputedPreview {
            artifact: artifact(key),
            size_bytes: 64,
        })
    }
}

struct FailingSource;

#[async_trait]
impl PreviewSource for FailingSource {
    async fn compute_preview(&self, key: &str) -> Result<ComputedPreview, PreviewSourceError> {
        Err(PreviewSourceError::Fetch(format!("no route to {key}")))
    }
}

#[tokio::test]
async fn service_computes_each_preview_once() {
    let store = Arc::new(PreviewStore::new(&config(8, 1_000)));
    let source = Arc::new(CountingSource {
        computed: AtomicUsize::new(0),
    });
    let service = PreviewService::new(store, source.clone());

    let first = service
        .resolve("https://courtline.example/match/42")
        .await
        .expect("computed preview");
    let second = service
        .resolve("https://courtline.example/match/42")
        .await
        .expect("cached preview");

    assert_eq!(first.url, second.url);
    assert_eq!(source.computed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn service_surfaces_source_failures() {
    let store = Arc::new(PreviewStore::new(&config(8, 1_000)));
    let service = PreviewService::new(store.clone(), Arc::new(FailingSource));

    let err = service
        .resolve("https://courtline.example/broken")
        .await
        .expect_err("source failure surfaces");

    assert!(matches!(err, PreviewSourceError::Fetch(_)));
    assert!(store.is_empty(), "failed lookups must not be cached");
}

#[tokio::test]
async fn service_serves_uncached_result_when_store_rejects() {
    // Artifacts of 64 bytes never fit under a 10 byte ceiling, so every
    // resolve recomputes.
    let store = Arc::new(PreviewStore::new(&config(8, 10)));
    let source = Arc::new(CountingSource {
        computed: AtomicUsize::new(0),
    });
    let service = PreviewService::new(store.clone(), source.clone());

    let first = service
        .resolve("https://courtline.example/match/7")
        .await
        .expect("uncached preview");
    let second = service
        .resolve("https://courtline.example/match/7")
        .await
        .expect("recomputed preview");

    assert_eq!(first.url, second.url);
    assert_eq!(source.computed.load(Ordering::SeqCst), 2);
    assert!(store.is_empty());
}
