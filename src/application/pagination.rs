//! Cursor pagination for feed sessions.

use std::collections::HashSet;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::tiers::CascadeTier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct TierMarkPayload {
    sort_key: OffsetDateTime,
    id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct TierStatePayload {
    mark: Option<TierMarkPayload>,
    #[serde(default)]
    exhausted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FeedCursorPayload {
    following: TierStatePayload,
    extended_network: TierStatePayload,
    curated_fallback: TierStatePayload,
    #[serde(default)]
    seen: Vec<String>,
}

/// Position of the last item consumed from one tier's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierMark {
    sort_key: OffsetDateTime,
    id: String,
}

impl TierMark {
    pub fn new(sort_key: OffsetDateTime, id: impl Into<String>) -> Self {
        Self {
            sort_key,
            id: id.into(),
        }
    }

    pub fn sort_key(&self) -> OffsetDateTime {
        self.sort_key
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Pagination state for one tier: resume position plus an exhausted flag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierState {
    mark: Option<TierMark>,
    exhausted: bool,
}

impl TierState {
    pub fn mark(&self) -> Option<&TierMark> {
        self.mark.as_ref()
    }

    pub fn exhausted(&self) -> bool {
        self.exhausted
    }
}

/// Opaque cursor for resuming a feed session.
///
/// Carries the per-tier resume positions and the set of item ids already
/// returned in the session, so pages never repeat content across tiers or
/// across calls.
#[derive(Debug, Clone, Default)]
pub struct FeedCursor {
    following: TierState,
    extended_network: TierState,
    curated_fallback: TierState,
    seen: Vec<String>,
}

impl FeedCursor {
    pub fn tier_state(&self, tier: CascadeTier) -> &TierState {
        match tier {
            CascadeTier::Following => &self.following,
            CascadeTier::ExtendedNetwork => &self.extended_network,
            CascadeTier::CuratedFallback => &self.curated_fallback,
        }
    }

    fn tier_state_mut(&mut self, tier: CascadeTier) -> &mut TierState {
        match tier {
            CascadeTier::Following => &mut self.following,
            CascadeTier::ExtendedNetwork => &mut self.extended_network,
            CascadeTier::CuratedFallback => &mut self.curated_fallback,
        }
    }

    /// Advance a tier's resume position.
    pub fn set_tier_mark(&mut self, tier: CascadeTier, mark: TierMark) {
        self.tier_state_mut(tier).mark = Some(mark);
    }

    /// Record that a tier returned fewer items than requested.
    pub fn mark_exhausted(&mut self, tier: CascadeTier) {
        self.tier_state_mut(tier).exhausted = true;
    }

    /// Record an id as returned in this session.
    pub fn note_seen(&mut self, id: impl Into<String>) {
        self.seen.push(id.into());
    }

    /// Ids already returned in this session.
    pub fn seen_ids(&self) -> HashSet<String> {
        self.seen.iter().cloned().collect()
    }

    pub fn all_exhausted(&self) -> bool {
        CascadeTier::ALL
            .iter()
            .all(|tier| self.tier_state(*tier).exhausted)
    }

    pub fn encode(&self) -> String {
        let payload = FeedCursorPayload {
            following: tier_state_payload(&self.following),
            extended_network: tier_state_payload(&self.extended_network),
            curated_fallback: tier_state_payload(&self.curated_fallback),
            seen: self.seen.clone(),
        };
        let serialized =
            serde_json::to_vec(&payload).expect("serializing feed cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: FeedCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            following: tier_state_from_payload(payload.following),
            extended_network: tier_state_from_payload(payload.extended_network),
            curated_fallback: tier_state_from_payload(payload.curated_fallback),
            seen: payload.seen,
        })
    }
}

fn tier_state_payload(state: &TierState) -> TierStatePayload {
    TierStatePayload {
        mark: state.mark.as_ref().map(|mark| TierMarkPayload {
            sort_key: mark.sort_key,
            id: mark.id.clone(),
        }),
        exhausted: state.exhausted,
    }
}

fn tier_state_from_payload(payload: TierStatePayload) -> TierState {
    TierState {
        mark: payload
            .mark
            .map(|mark| TierMark::new(mark.sort_key, mark.id)),
        exhausted: payload.exhausted,
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_cursor_round_trip() {
        let when = OffsetDateTime::now_utc();
        let mut cursor = FeedCursor::default();
        cursor.set_tier_mark(CascadeTier::Following, TierMark::new(when, "post-9"));
        cursor.mark_exhausted(CascadeTier::ExtendedNetwork);
        cursor.note_seen("post-9");
        cursor.note_seen("post-7");

        let encoded = cursor.encode();
        let decoded = FeedCursor::decode(&encoded).expect("decoded cursor");

        let mark = decoded
            .tier_state(CascadeTier::Following)
            .mark()
            .expect("following mark");
        assert_eq!(mark.sort_key(), when);
        assert_eq!(mark.id(), "post-9");
        assert!(decoded.tier_state(CascadeTier::ExtendedNetwork).exhausted());
        assert!(!decoded.tier_state(CascadeTier::CuratedFallback).exhausted());
        assert_eq!(
            decoded.seen_ids(),
            HashSet::from(["post-9".to_string(), "post-7".to_string()])
        );
    }

    #[test]
    fn default_cursor_has_no_positions() {
        let cursor = FeedCursor::default();
        for tier in CascadeTier::ALL {
            assert!(cursor.tier_state(tier).mark().is_none());
            assert!(!cursor.tier_state(tier).exhausted());
        }
        assert!(!cursor.all_exhausted());
    }

    #[test]
    fn all_exhausted_requires_every_tier() {
        let mut cursor = FeedCursor::default();
        cursor.mark_exhausted(CascadeTier::Following);
        cursor.mark_exhausted(CascadeTier::ExtendedNetwork);
        assert!(!cursor.all_exhausted());

        cursor.mark_exhausted(CascadeTier::CuratedFallback);
        assert!(cursor.all_exhausted());
    }

    #[test]
    fn decoding_invalid_cursor_reports_error() {
        let err = FeedCursor::decode("not-base64!").expect_err("invalid cursor rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));

        let valid_base64_bad_payload = URL_SAFE_NO_PAD.encode(b"{\"nope\":true");
        let err = FeedCursor::decode(&valid_base64_bad_payload).expect_err("bad payload rejected");
        assert!(matches!(err, PaginationError::InvalidCursor(_)));
    }
}
