//! Preview cache configuration.
//!
//! Ceilings are controlled via `courtline.toml` or `COURTLINE__`-prefixed
//! environment variables.

use serde::Deserialize;

// Default values for the preview cache
const DEFAULT_MAX_ENTRIES: usize = 256;
const DEFAULT_MAX_BYTES: u64 = 8 * 1024 * 1024;

/// Preview cache ceilings.
///
/// Both limits apply at once: an insert must satisfy the entry-count ceiling
/// and the byte ceiling before it is admitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PreviewCacheConfig {
    /// Maximum number of cached preview artifacts.
    pub max_entries: usize,
    /// Maximum total size of cached artifacts in bytes.
    pub max_bytes: u64,
}

impl Default for PreviewCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl From<&crate::config::PreviewCacheSettings> for PreviewCacheConfig {
    fn from(settings: &crate::config::PreviewCacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            max_bytes: settings.max_bytes,
        }
    }
}

impl PreviewCacheConfig {
    /// Returns the entry ceiling clamped to at least 1.
    pub fn max_entries_clamped(&self) -> usize {
        self.max_entries.max(1)
    }
}
