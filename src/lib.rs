//! Courtline Feed Core
//!
//! Feed assembly and preview caching for the Courtline tennis community
//! platform. The [`application::cascade::FeedCascade`] service fills feed
//! pages by walking content tiers in priority order, while the
//! [`cache::PreviewStore`] keeps computed link and media previews in a
//! bounded in-memory cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod util;
