//! Feed assembly across priority tiers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, histogram};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::application::pagination::{FeedCursor, TierMark};
use crate::application::preview::PreviewService;
use crate::application::repos::ContentRepo;
use crate::cache::PreviewArtifact;
use crate::config::FeedSettings;
use crate::domain::content::{AuthorKind, ContentItem};
use crate::domain::tiers::{CascadeMetric, CascadeTier};

const METRIC_FEED_PAGE_TOTAL: &str = "courtline_feed_page_total";
const METRIC_FEED_TIER_FAILURE_TOTAL: &str = "courtline_feed_tier_failure_total";
const METRIC_FEED_FILL_MS: &str = "courtline_feed_fill_ms";

/// One assembled page of a viewer's feed.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub viewer_id: String,
    pub page_size: usize,
    pub items: Vec<ContentItem>,
    pub previews: HashMap<String, PreviewArtifact>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub metrics: Vec<CascadeMetric>,
}

impl FeedPage {
    fn drained(viewer_id: &str, page_size: usize) -> Self {
        Self {
            viewer_id: viewer_id.to_string(),
            page_size,
            items: Vec::new(),
            previews: HashMap::new(),
            next_cursor: None,
            has_more: false,
            metrics: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
    #[error("no feed tier could be reached")]
    FeedUnavailable,
    #[error("feed assembly cancelled")]
    Cancelled,
}

enum TierOutcome {
    Items(Vec<ContentItem>),
    Failed,
    Cancelled,
}

/// Assembles feed pages by walking content tiers in priority order.
///
/// Tiers are queried sequentially and each is asked only for the items still
/// missing from the page, so lower tiers are touched only when higher tiers
/// run dry.
#[derive(Clone)]
pub struct FeedCascade {
    repo: Arc<dyn ContentRepo>,
    previews: Option<PreviewService>,
    settings: FeedSettings,
}

impl FeedCascade {
    pub fn new(repo: Arc<dyn ContentRepo>, settings: FeedSettings) -> Self {
        Self {
            repo,
            previews: None,
            settings,
        }
    }

    /// Enable best-effort preview enrichment for assembled pages.
    pub fn with_previews(mut self, previews: PreviewService) -> Self {
        self.previews = Some(previews);
        self
    }

    /// Assemble one page of the viewer's feed.
    pub async fn fetch_page(
        &self,
        viewer_id: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<FeedPage, FeedError> {
        self.assemble(viewer_id, page_size, cursor, None).await
    }

    /// Assemble one page, racing every tier query against a cancellation
    /// signal.
    ///
    /// Cancellation after items were collected returns the partial page with
    /// `has_more` set; cancellation before anything was collected fails with
    /// [`FeedError::Cancelled`].
    pub async fn fetch_page_with_cancel(
        &self,
        viewer_id: &str,
        page_size: usize,
        cursor: Option<&str>,
        cancel: watch::Receiver<bool>,
    ) -> Result<FeedPage, FeedError> {
        self.assemble(viewer_id, page_size, cursor, Some(cancel))
            .await
    }

    /// Fetch the page after `previous`.
    ///
    /// Once a session is drained this returns an empty page without issuing
    /// any tier query.
    pub async fn load_more(&self, previous: &FeedPage) -> Result<FeedPage, FeedError> {
        match previous.next_cursor.as_deref() {
            Some(cursor) if previous.has_more => {
                self.fetch_page(&previous.viewer_id, previous.page_size, Some(cursor))
                    .await
            }
            _ => Ok(FeedPage::drained(&previous.viewer_id, previous.page_size)),
        }
    }

    async fn assemble(
        &self,
        viewer_id: &str,
        page_size: usize,
        cursor: Option<&str>,
        mut cancel: Option<watch::Receiver<bool>>,
    ) -> Result<FeedPage, FeedError> {
        if viewer_id.trim().is_empty() {
            return Err(FeedError::InvalidRequest(
                "viewer_id must not be empty".to_string(),
            ));
        }
        if page_size == 0 {
            return Err(FeedError::InvalidRequest(
                "page_size must be at least 1".to_string(),
            ));
        }

        let mut cursor = match cursor {
            Some(raw) => {
                FeedCursor::decode(raw).map_err(|err| FeedError::InvalidCursor(err.to_string()))?
            }
            None => FeedCursor::default(),
        };

        if cursor.all_exhausted() {
            return Ok(FeedPage::drained(viewer_id, page_size));
        }

        let fill_started_at = Instant::now();
        let tier_timeout = self.settings.tier_timeout();
        let mut seen: HashSet<String> = cursor.seen_ids();
        let mut items: Vec<ContentItem> = Vec::with_capacity(page_size);
        let mut metrics: Vec<CascadeMetric> = Vec::new();
        let mut queried = 0usize;
        let mut failed = 0usize;
        let mut cancelled = false;

        for tier in CascadeTier::ALL {
            if items.len() >= page_size {
                break;
            }
            if cursor.tier_state(tier).exhausted() {
                continue;
            }

            let remaining = page_size - items.len();
            let mark = cursor.tier_state(tier).mark().cloned();
            queried += 1;

            let query = self
                .repo
                .query_tier(tier, viewer_id, mark.as_ref(), remaining);
            let outcome = match cancel.as_mut() {
                Some(rx) => tokio::select! {
                    _ = cancel_requested(rx) => TierOutcome::Cancelled,
                    result = timeout(tier_timeout, query) => match result {
                        Ok(Ok(batch)) => TierOutcome::Items(batch),
                        Ok(Err(err)) => {
                            warn!(
                                tier = tier.as_str(),
                                viewer = viewer_id,
                                error = %err,
                                "Tier query failed; continuing cascade"
                            );
                            TierOutcome::Failed
                        }
                        Err(_) => {
                            warn!(
                                tier = tier.as_str(),
                                viewer = viewer_id,
                                timeout_ms = tier_timeout.as_millis() as u64,
                                "Tier query timed out; continuing cascade"
                            );
                            TierOutcome::Failed
                        }
                    },
                },
                None => match timeout(tier_timeout, query).await {
                    Ok(Ok(batch)) => TierOutcome::Items(batch),
                    Ok(Err(err)) => {
                        warn!(
                            tier = tier.as_str(),
                            viewer = viewer_id,
                            error = %err,
                            "Tier query failed; continuing cascade"
                        );
                        TierOutcome::Failed
                    }
                    Err(_) => {
                        warn!(
                            tier = tier.as_str(),
                            viewer = viewer_id,
                            timeout_ms = tier_timeout.as_millis() as u64,
                            "Tier query timed out; continuing cascade"
                        );
                        TierOutcome::Failed
                    }
                },
            };

            match outcome {
                TierOutcome::Cancelled => {
                    cancelled = true;
                    break;
                }
                TierOutcome::Failed => {
                    counter!(METRIC_FEED_TIER_FAILURE_TOTAL, "tier" => tier.as_str()).increment(1);
                    metrics.push(CascadeMetric {
                        tier,
                        post_count: 0,
                    });
                    failed += 1;
                    // Mark stays put so the tier is retried on the next page.
                }
                TierOutcome::Items(mut batch) => {
                    batch.sort_by(|a, b| {
                        b.created_at
                            .cmp(&a.created_at)
                            .then_with(|| a.id.cmp(&b.id))
                    });
                    let tier_drained = batch.len() < remaining;
                    batch.truncate(remaining);

                    if let Some(last) = batch.last() {
                        cursor.set_tier_mark(tier, TierMark::new(last.created_at, last.id.clone()));
                    }
                    if tier_drained {
                        cursor.mark_exhausted(tier);
                    }

                    let mut contributed = 0usize;
                    for item in batch {
                        if seen.insert(item.id.clone()) {
                            cursor.note_seen(item.id.clone());
                            items.push(item);
                            contributed += 1;
                        }
                    }
                    metrics.push(CascadeMetric {
                        tier,
                        post_count: contributed,
                    });
                }
            }
        }

        if cancelled && items.is_empty() {
            return Err(FeedError::Cancelled);
        }
        if !cancelled && queried > 0 && failed == queried && items.is_empty() {
            return Err(FeedError::FeedUnavailable);
        }

        let has_more = cancelled || !cursor.all_exhausted();
        let next_cursor = has_more.then(|| cursor.encode());
        let previews = self.enrich_previews(&items).await;

        counter!(METRIC_FEED_PAGE_TOTAL).increment(1);
        histogram!(METRIC_FEED_FILL_MS).record(fill_started_at.elapsed().as_secs_f64() * 1000.0);
        debug!(
            viewer = viewer_id,
            page_size,
            collected = items.len(),
            tiers_queried = queried,
            cancelled,
            "Feed page assembled"
        );

        Ok(FeedPage {
            viewer_id: viewer_id.to_string(),
            page_size,
            items,
            previews,
            next_cursor,
            has_more,
            metrics,
        })
    }

    async fn enrich_previews(
        &self,
        items: &[ContentItem],
    ) -> HashMap<String, PreviewArtifact> {
        let Some(service) = self.previews.as_ref() else {
            return HashMap::new();
        };

        let mut urls: Vec<&str> = items
            .iter()
            .filter_map(|item| item.media_ref.as_ref().map(|media| media.url.as_str()))
            .collect();
        urls.sort_unstable();
        urls.dedup();

        let lookups = urls.into_iter().map(|url| async move {
            (url.to_string(), service.resolve(url).await)
        });

        let mut previews = HashMap::new();
        for (url, resolved) in join_all(lookups).await {
            match resolved {
                Ok(artifact) => {
                    previews.insert(url, artifact);
                }
                Err(err) => {
                    debug!(url, error = %err, "Preview resolution failed; skipping");
                }
            }
        }
        previews
    }
}

async fn cancel_requested(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow() {
            return;
        }
        if cancel.changed().await.is_err() {
            // Sender dropped without signalling; this fetch can no longer be
            // cancelled.
            std::future::pending::<()>().await;
        }
    }
}

/// Fraction of items authored by ambassador accounts, in `[0, 1]`.
pub fn ambassador_share(items: &[ContentItem]) -> f64 {
    if items.is_empty() {
        return 0.0;
    }
    let ambassadors = items
        .iter()
        .filter(|item| item.author_kind == AuthorKind::Ambassador)
        .count();
    ambassadors as f64 / items.len() as f64
}
