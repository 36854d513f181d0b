//! Ingestion configuration
//!
//! Everything the loader needs to know about where the list comes from, how
//! often to fetch it and which tables it feeds. Loaded from `INGEST_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CycleContext, PromotePlan, DEFAULT_BATCH_SIZE, DEFAULT_PAYLOAD_NAME, MAX_BATCH_SIZE};
use crate::config::env_or;

/// Default archive location of the published list.
pub const DEFAULT_ZIP_URL: &str =
    "http://s3-us-west-1.amazonaws.com/umbrella-static/top-1m.csv.zip";

/// Default run interval (one day).
pub const DEFAULT_INTERVAL_SECS: u64 = 86_400;

/// Default HTTP timeout for the archive download.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Longest live table name; leaves room for the staging suffix inside
/// PostgreSQL's 63 byte identifier limit.
pub const MAX_TABLE_NAME_LEN: usize = 40;

/// Names of the live tables the loader writes to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableNames {
    /// Current snapshot, one row per domain
    pub current: String,
    /// Daily history, one row per domain per day
    pub history: String,
}

impl TableNames {
    /// Staging table name for one cycle, derived from the live table name
    pub fn staging_for(&self, ctx: &CycleContext) -> String {
        format!("{}_staging_{}", self.current, ctx.short_id())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        for (var, name) in [
            ("INGEST_CURRENT_TABLE", &self.current),
            ("INGEST_HISTORY_TABLE", &self.history),
        ] {
            if !is_plain_identifier(name) {
                anyhow::bail!(
                    "{} must be a lowercase SQL identifier of at most {} characters, got: {:?}",
                    var,
                    MAX_TABLE_NAME_LEN,
                    name
                );
            }
        }
        if self.current == self.history {
            anyhow::bail!("INGEST_CURRENT_TABLE and INGEST_HISTORY_TABLE must differ");
        }
        Ok(())
    }
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            current: "current".to_string(),
            history: "ranking".to_string(),
        }
    }
}

/// `[a-z_][a-z0-9_]*`, short enough to take a staging suffix
///
/// Table names are interpolated into SQL, so nothing else is accepted.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    name.len() <= MAX_TABLE_NAME_LEN
        && (first.is_ascii_lowercase() || first == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Main ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Whether `u1m-server` starts the scheduler
    pub enabled: bool,
    /// HTTP(S) location of the zip archive
    pub zip_url: String,
    /// Entry to read from the archive
    pub payload_name: String,
    /// Seconds between cycle starts
    pub interval_secs: u64,
    /// Rows per multi-row insert
    pub batch_size: usize,
    /// Timeout for the whole archive download
    pub http_timeout_secs: u64,
    /// Upsert staging into the current table
    pub update_current: bool,
    /// Append staging to the history table tagged with the cycle day
    pub record_history: bool,
    pub tables: TableNames,
}

impl IngestConfig {
    /// Load ingestion configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            enabled: env_or("INGEST_ENABLED", defaults.enabled)?,
            zip_url: env_or("INGEST_ZIP_URL", defaults.zip_url)?,
            payload_name: env_or("INGEST_PAYLOAD_NAME", defaults.payload_name)?,
            interval_secs: env_or("INGEST_INTERVAL_SECS", defaults.interval_secs)?,
            batch_size: env_or("INGEST_BATCH_SIZE", defaults.batch_size)?,
            http_timeout_secs: env_or("INGEST_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
            update_current: env_or("INGEST_UPDATE_CURRENT", defaults.update_current)?,
            record_history: env_or("INGEST_RECORD_HISTORY", defaults.record_history)?,
            tables: TableNames {
                current: env_or("INGEST_CURRENT_TABLE", defaults.tables.current)?,
                history: env_or("INGEST_HISTORY_TABLE", defaults.tables.history)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.zip_url.is_empty() {
            anyhow::bail!("INGEST_ZIP_URL cannot be empty");
        }
        let url = reqwest::Url::parse(&self.zip_url)
            .map_err(|e| anyhow::anyhow!("INGEST_ZIP_URL is not a valid URL: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("INGEST_ZIP_URL must be http or https, got: {}", url.scheme());
        }
        if self.payload_name.is_empty() {
            anyhow::bail!("INGEST_PAYLOAD_NAME cannot be empty");
        }
        if self.interval_secs == 0 {
            anyhow::bail!("INGEST_INTERVAL_SECS must be greater than 0");
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!(
                "INGEST_BATCH_SIZE must be between 1 and {}, got: {}",
                MAX_BATCH_SIZE,
                self.batch_size
            );
        }
        if self.http_timeout_secs == 0 {
            anyhow::bail!("INGEST_HTTP_TIMEOUT_SECS must be greater than 0");
        }
        if !self.update_current && !self.record_history {
            anyhow::bail!("At least one of INGEST_UPDATE_CURRENT and INGEST_RECORD_HISTORY must be true");
        }
        self.tables.validate()?;
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// What the swap coordinator should do at the end of `ctx`
    pub fn promote_plan(&self, ctx: &CycleContext) -> PromotePlan {
        PromotePlan {
            update_current: self.update_current,
            history_day: self.record_history.then_some(ctx.day),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            zip_url: DEFAULT_ZIP_URL.to_string(),
            payload_name: DEFAULT_PAYLOAD_NAME.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            update_current: true,
            record_history: true,
            tables: TableNames::default(),
        }
    }
}
