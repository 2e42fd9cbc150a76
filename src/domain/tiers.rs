//! Cascade tiers and per-tier fill accounting.

use serde::{Deserialize, Serialize};

/// Source tier for feed content, in fixed priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeTier {
    Following,
    ExtendedNetwork,
    CuratedFallback,
}

impl CascadeTier {
    /// Every tier, highest priority first.
    pub const ALL: [CascadeTier; 3] = [
        CascadeTier::Following,
        CascadeTier::ExtendedNetwork,
        CascadeTier::CuratedFallback,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CascadeTier::Following => "following",
            CascadeTier::ExtendedNetwork => "extended_network",
            CascadeTier::CuratedFallback => "curated_fallback",
        }
    }
}

/// Fill accounting for one tier actually queried while assembling a page.
///
/// A tier that was skipped (page already full, or exhausted in the cursor)
/// gets no entry; a tier that was queried and failed or returned nothing
/// gets an entry with `post_count` zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CascadeMetric {
    pub tier: CascadeTier,
    pub post_count: usize,
}
