//! Repository traits describing content-access adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::TierMark;
use crate::domain::content::ContentItem;
use crate::domain::tiers::CascadeTier;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("query failed: {message}")]
    Query { message: String },
    #[error("backend timeout")]
    Timeout,
}

impl RepoError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

/// Read access to the content backing a viewer's feed.
///
/// Implementations return items newest-first and exclude everything at or
/// before `after`, so repeated calls with advancing marks stream a tier
/// without overlap.
#[async_trait]
pub trait ContentRepo: Send + Sync {
    async fn query_tier(
        &self,
        tier: CascadeTier,
        viewer_id: &str,
        after: Option<&TierMark>,
        limit: usize,
    ) -> Result<Vec<ContentItem>, RepoError>;
}
