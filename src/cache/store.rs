//! Preview cache storage.
//!
//! Maps a content fingerprint (media or link URL) to a previously computed
//! preview artifact. Eviction removes entries in ascending last-accessed
//! order until both the entry-count ceiling and the byte ceiling admit the
//! incoming entry.

use std::sync::RwLock;

use lru::LruCache;
use metrics::counter;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

use crate::util::bytes::format_bytes;

use super::config::PreviewCacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_PREVIEW_HIT_TOTAL: &str = "courtline_preview_hit_total";
const METRIC_PREVIEW_MISS_TOTAL: &str = "courtline_preview_miss_total";
const METRIC_PREVIEW_EVICT_TOTAL: &str = "courtline_preview_evict_total";
const METRIC_PREVIEW_REJECT_TOTAL: &str = "courtline_preview_reject_total";

/// Computed unfurl for a media or link URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewArtifact {
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

struct PreviewEntry {
    artifact: PreviewArtifact,
    size_bytes: u64,
    last_accessed_at: OffsetDateTime,
}

struct StoreInner {
    // LruCache promotion order doubles as ascending last-accessed order;
    // `last_accessed_at` is kept for diagnostics only.
    entries: LruCache<String, PreviewEntry>,
    total_bytes: u64,
}

/// Point-in-time cache diagnostics. Produced by [`PreviewStore::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub memory_usage_bytes: u64,
    pub fill_percentage: f64,
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} entries, {} of {} ({:.1}% full)",
            self.total_entries,
            format_bytes(self.memory_usage_bytes),
            format_bytes(self.max_bytes),
            self.fill_percentage
        )
    }
}

/// Bounded in-memory preview cache.
///
/// Shared by `Arc` from the embedding application's composition root; the
/// store itself never computes previews.
pub struct PreviewStore {
    config: PreviewCacheConfig,
    inner: RwLock<StoreInner>,
}

impl PreviewStore {
    /// Create a new store with the given ceilings.
    pub fn new(config: &PreviewCacheConfig) -> Self {
        Self {
            config: config.clone(),
            inner: RwLock::new(StoreInner {
                entries: LruCache::unbounded(),
                total_bytes: 0,
            }),
        }
    }

    /// Look up a cached artifact, refreshing its recency. Never evicts.
    pub fn get(&self, key: &str) -> Option<PreviewArtifact> {
        let mut inner = rw_write(&self.inner, SOURCE, "get");
        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed_at = OffsetDateTime::now_utc();
                counter!(METRIC_PREVIEW_HIT_TOTAL).increment(1);
                Some(entry.artifact.clone())
            }
            None => {
                counter!(METRIC_PREVIEW_MISS_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert or replace an artifact, evicting least-recently-accessed
    /// entries until both ceilings admit it.
    ///
    /// An entry whose own size exceeds the byte ceiling is rejected without
    /// evicting anything; returns whether the entry was stored.
    pub fn set(&self, key: &str, artifact: PreviewArtifact, size_bytes: u64) -> bool {
        if size_bytes > self.config.max_bytes {
            debug!(
                key,
                size = %format_bytes(size_bytes),
                ceiling = %format_bytes(self.config.max_bytes),
                "Preview artifact exceeds cache byte ceiling; not cached"
            );
            counter!(METRIC_PREVIEW_REJECT_TOTAL).increment(1);
            return false;
        }

        let max_entries = self.config.max_entries_clamped();
        let mut inner = rw_write(&self.inner, SOURCE, "set");

        if let Some(previous) = inner.entries.pop(key) {
            inner.total_bytes = inner.total_bytes.saturating_sub(previous.size_bytes);
        }

        while inner.entries.len() >= max_entries
            || inner.total_bytes + size_bytes > self.config.max_bytes
        {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size_bytes);
                    counter!(METRIC_PREVIEW_EVICT_TOTAL).increment(1);
                }
                None => break,
            }
        }

        inner.entries.push(
            key.to_string(),
            PreviewEntry {
                artifact,
                size_bytes,
                last_accessed_at: OffsetDateTime::now_utc(),
            },
        );
        inner.total_bytes += size_bytes;
        true
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        let mut inner = rw_write(&self.inner, SOURCE, "clear");
        inner.entries.clear();
        inner.total_bytes = 0;
    }

    /// Report current occupancy without mutating recency state.
    pub fn stats(&self) -> CacheStats {
        let inner = rw_read(&self.inner, SOURCE, "stats");
        let max_entries = self.config.max_entries_clamped();
        let entry_fill = inner.entries.len() as f64 / max_entries as f64;
        let byte_fill = inner.total_bytes as f64 / self.config.max_bytes.max(1) as f64;
        CacheStats {
            total_entries: inner.entries.len(),
            memory_usage_bytes: inner.total_bytes,
            fill_percentage: entry_fill.max(byte_fill) * 100.0,
            max_entries: self.config.max_entries,
            max_bytes: self.config.max_bytes,
        }
    }

    /// Get the number of cached artifacts.
    pub fn len(&self) -> usize {
        rw_read(&self.inner, SOURCE, "len").entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn artifact(url: &str) -> PreviewArtifact {
        PreviewArtifact {
            url: url.to_string(),
            title: Some("Court One Highlights".to_string()),
            description: Some("Match point rally".to_string()),
            image_url: Some(format!("{url}/thumb.jpg")),
        }
    }

    fn small_config(max_entries: usize, max_bytes: u64) -> PreviewCacheConfig {
        PreviewCacheConfig {
            max_entries,
            max_bytes,
        }
    }

    #[test]
    fn get_and_set_round_trip() {
        let store = PreviewStore::new(&PreviewCacheConfig::default());

        assert!(store.get("https://cdn.example/a").is_none());
        assert!(store.set("https://cdn.example/a", artifact("https://cdn.example/a"), 100));

        let cached = store.get("https://cdn.example/a").expect("cached artifact");
        assert_eq!(cached.url, "https://cdn.example/a");
    }

    #[test]
    fn entry_ceiling_evicts_least_recent() {
        let store = PreviewStore::new(&small_config(2, 1024 * 1024));

        store.set("k1", artifact("k1"), 10);
        store.set("k2", artifact("k2"), 10);
        store.set("k3", artifact("k3"), 10);

        assert!(store.get("k1").is_none());
        assert!(store.get("k2").is_some());
        assert!(store.get("k3").is_some());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn get_refreshes_recency() {
        let store = PreviewStore::new(&small_config(3, 1024 * 1024));

        store.set("k1", artifact("k1"), 10);
        store.set("k2", artifact("k2"), 10);
        store.set("k3", artifact("k3"), 10);

        // Touching k1 makes k2 the eviction candidate.
        assert!(store.get("k1").is_some());
        store.set("k4", artifact("k4"), 10);

        assert!(store.get("k2").is_none());
        assert!(store.get("k1").is_some());
        assert!(store.get("k3").is_some());
        assert!(store.get("k4").is_some());
    }

    #[test]
    fn byte_ceiling_evicts_until_admitted() {
        let store = PreviewStore::new(&small_config(10, 100));

        store.set("k1", artifact("k1"), 40);
        store.set("k2", artifact("k2"), 40);
        store.set("k3", artifact("k3"), 40);

        assert!(store.get("k1").is_none());
        assert_eq!(store.stats().memory_usage_bytes, 80);
    }

    #[test]
    fn oversized_entry_rejected_without_eviction() {
        let store = PreviewStore::new(&small_config(10, 100));

        store.set("k1", artifact("k1"), 40);
        assert!(!store.set("huge", artifact("huge"), 101));

        assert!(store.get("huge").is_none());
        assert!(store.get("k1").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn replacing_entry_reclaims_bytes() {
        let store = PreviewStore::new(&small_config(10, 100));

        store.set("k1", artifact("k1"), 60);
        store.set("k1", artifact("k1"), 30);

        let stats = store.stats();
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.memory_usage_bytes, 30);
    }

    #[test]
    fn clear_resets_occupancy() {
        let store = PreviewStore::new(&small_config(10, 100));

        store.set("k1", artifact("k1"), 40);
        store.set("k2", artifact("k2"), 40);
        store.clear();

        assert!(store.is_empty());
        assert_eq!(store.stats().memory_usage_bytes, 0);
    }

    #[test]
    fn stats_reports_binding_ceiling() {
        let store = PreviewStore::new(&small_config(4, 100));

        store.set("k1", artifact("k1"), 75);
        let stats = store.stats();

        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.memory_usage_bytes, 75);
        // Byte fill (75%) dominates entry fill (25%).
        assert!((stats.fill_percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(format!("{stats}"), "1 entries, 75 B of 100 B (75.0% full)");
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = PreviewStore::new(&PreviewCacheConfig::default());

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.inner.write().expect("inner lock should be acquired");
            panic!("poison preview store lock");
        }));

        assert!(store.set("k1", artifact("k1"), 10));
        assert!(store.get("k1").is_some());
    }
}
