//! Configuration layer: typed settings with layered precedence (file → env).

use std::{str::FromStr, time::Duration};

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const LOCAL_CONFIG_BASENAME: &str = "courtline";
const ENV_PREFIX: &str = "COURTLINE";
const DEFAULT_TIER_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_PREVIEW_MAX_ENTRIES: usize = 256;
const DEFAULT_PREVIEW_MAX_BYTES: u64 = 8 * 1024 * 1024;

/// Fully-resolved runtime settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub feed: FeedSettings,
    pub preview_cache: PreviewCacheSettings,
    pub logging: LoggingSettings,
}

/// Settings governing feed page assembly.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    tier_timeout: Duration,
}

impl FeedSettings {
    pub fn new(tier_timeout: Duration) -> Self {
        Self { tier_timeout }
    }

    /// Budget for a single tier query before the cascade moves on.
    pub fn tier_timeout(&self) -> Duration {
        self.tier_timeout
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            tier_timeout: Duration::from_millis(DEFAULT_TIER_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PreviewCacheSettings {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for PreviewCacheSettings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_PREVIEW_MAX_ENTRIES,
            max_bytes: DEFAULT_PREVIEW_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl SettingsError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment).
pub fn load() -> Result<Settings, SettingsError> {
    let raw: RawSettings = Config::builder()
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    feed: RawFeedSettings,
    preview_cache: RawPreviewCacheSettings,
    logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFeedSettings {
    tier_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPreviewCacheSettings {
    max_entries: Option<usize>,
    max_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, SettingsError> {
        let RawSettings {
            feed,
            preview_cache,
            logging,
        } = raw;

        let feed = build_feed_settings(feed)?;
        let preview_cache = build_preview_cache_settings(preview_cache)?;
        let logging = build_logging_settings(logging)?;

        Ok(Self {
            feed,
            preview_cache,
            logging,
        })
    }
}

fn build_feed_settings(feed: RawFeedSettings) -> Result<FeedSettings, SettingsError> {
    let tier_timeout_ms = feed.tier_timeout_ms.unwrap_or(DEFAULT_TIER_TIMEOUT_MS);
    if tier_timeout_ms == 0 {
        return Err(SettingsError::invalid(
            "feed.tier_timeout_ms",
            "must be greater than zero",
        ));
    }

    Ok(FeedSettings {
        tier_timeout: Duration::from_millis(tier_timeout_ms),
    })
}

fn build_preview_cache_settings(
    preview_cache: RawPreviewCacheSettings,
) -> Result<PreviewCacheSettings, SettingsError> {
    let max_entries = preview_cache
        .max_entries
        .unwrap_or(DEFAULT_PREVIEW_MAX_ENTRIES);
    if max_entries == 0 {
        return Err(SettingsError::invalid(
            "preview_cache.max_entries",
            "must be greater than zero",
        ));
    }

    let max_bytes = preview_cache.max_bytes.unwrap_or(DEFAULT_PREVIEW_MAX_BYTES);
    if max_bytes == 0 {
        return Err(SettingsError::invalid(
            "preview_cache.max_bytes",
            "must be greater than zero",
        ));
    }

    Ok(PreviewCacheSettings {
        max_entries,
        max_bytes,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, SettingsError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            SettingsError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}
