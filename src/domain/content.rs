//! Content records mirrored from the platform's content services.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Kind of account that authored a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    Regular,
    Ambassador,
}

impl AuthorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthorKind::Regular => "regular",
            AuthorKind::Ambassador => "ambassador",
        }
    }
}

/// Kind of media attached to a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// Reference to an attached media object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

/// Engagement counters refreshed out-of-band; the loader only reads them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub comments: u64,
}

/// A single feed-eligible piece of content.
///
/// Immutable from the loader's perspective; assembly reads and orders but
/// never mutates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub author_id: String,
    pub author_kind: AuthorKind,
    pub created_at: OffsetDateTime,
    pub body: Option<String>,
    pub media_ref: Option<MediaRef>,
    pub engagement: EngagementCounts,
}
