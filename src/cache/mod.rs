//! Courtline Preview Cache
//!
//! Bounded in-memory cache for computed preview artifacts, keyed by the
//! media or link URL that produced them.
//!
//! - Least-recently-accessed eviction under an entry-count ceiling and a
//!   byte ceiling, enforced together on insert
//! - Reads refresh recency and never evict
//!
//! ## Configuration
//!
//! Ceilings are controlled via `courtline.toml`:
//!
//! ```toml
//! [preview_cache]
//! max_entries = 256
//! max_bytes = 8388608
//! ```

mod config;
mod lock;
mod store;

pub use config::PreviewCacheConfig;
pub use store::{CacheStats, PreviewArtifact, PreviewStore};
