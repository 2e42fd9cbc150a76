//! Preview resolution on top of the preview cache.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::cache::{PreviewArtifact, PreviewStore};

#[derive(Debug, Error)]
pub enum PreviewSourceError {
    #[error("preview fetch failed: {0}")]
    Fetch(String),
    #[error("unsupported content: {0}")]
    Unsupported(String),
}

impl PreviewSourceError {
    pub fn fetch(err: impl std::fmt::Display) -> Self {
        Self::Fetch(err.to_string())
    }
}

/// A freshly computed preview plus the footprint it should occupy in cache.
#[derive(Debug, Clone)]
pub struct ComputedPreview {
    pub artifact: PreviewArtifact,
    pub size_bytes: u64,
}

/// Collaborator that computes a preview artifact for a fingerprint.
#[async_trait]
pub trait PreviewSource: Send + Sync {
    async fn compute_preview(&self, key: &str) -> Result<ComputedPreview, PreviewSourceError>;
}

/// Get-or-compute front for the preview cache.
///
/// Cache hits are served directly; misses go through the source and the
/// result is stored before being returned. The cache itself never computes.
#[derive(Clone)]
pub struct PreviewService {
    store: Arc<PreviewStore>,
    source: Arc<dyn PreviewSource>,
}

impl PreviewService {
    pub fn new(store: Arc<PreviewStore>, source: Arc<dyn PreviewSource>) -> Self {
        Self { store, source }
    }

    pub fn store(&self) -> &Arc<PreviewStore> {
        &self.store
    }

    /// Resolve the artifact for a fingerprint, computing it on a miss.
    pub async fn resolve(&self, key: &str) -> Result<PreviewArtifact, PreviewSourceError> {
        if let Some(cached) = self.store.get(key) {
            return Ok(cached);
        }

        let computed = self.source.compute_preview(key).await?;
        if !self.store.set(key, computed.artifact.clone(), computed.size_bytes) {
            debug!(key, "Computed preview not cached; serving uncached result");
        }
        Ok(computed.artifact)
    }
}
