//! Top-1M list ingestion
//!
//! Downloads the published ranking archive, parses it, bulk-loads it into a
//! per-cycle staging table and promotes that table into the live `current`
//! and `ranking` tables.
//!
//! # Architecture
//!
//! - **fetcher**: HTTP download of the zip archive and lookup of `top-1m.csv`
//! - **parser**: lazy `(rank, domain)` record iterator over the CSV payload
//! - **loader**: batches records into multi-row inserts against staging
//! - **promote**: merges staging into `current` and appends dated history
//! - **storage**: `RankingStore` / `StagingArea` traits and the PostgreSQL backend
//! - **pipeline**: one fetch → parse → load → promote cycle
//! - **scheduler**: runs cycles on a fixed interval, forever
//!
//! A cycle that fails at any stage leaves `current` exactly as it was: nothing
//! becomes visible to readers until the promote transaction commits.

pub mod config;
pub mod fetcher;
pub mod loader;
pub mod parser;
pub mod pipeline;
pub mod promote;
pub mod scheduler;
pub mod storage;

use chrono::{Local, NaiveDate};
use std::time::Instant;
use uuid::Uuid;

pub use config::{IngestConfig, TableNames};
pub use fetcher::{ArchiveFetcher, PayloadArchive};
pub use loader::{BulkLoader, LoadStats};
pub use parser::RecordParser;
pub use pipeline::{CycleStats, IngestPipeline};
pub use promote::{PromotePlan, PromoteStats, SwapCoordinator};
pub use scheduler::{CycleRunner, IngestScheduler};
pub use storage::{PgRankingStore, RankingStore, StagingArea};

/// Rows per multi-row insert.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Largest batch that keeps a two-column insert under PostgreSQL's 65 535
/// bind parameter limit.
pub const MAX_BATCH_SIZE: usize = 30_000;

/// Name of the CSV entry inside the published archive.
pub const DEFAULT_PAYLOAD_NAME: &str = "top-1m.csv";

/// Result type for ingestion operations
pub type IngestResult<T> = std::result::Result<T, IngestError>;

/// Pipeline stage an error came from, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Load,
    Promote,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Load => "load",
            Stage::Promote => "promote",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error types for ingestion cycles
///
/// Every variant aborts the current cycle only.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Network failure fetching {url}: {source}")]
    NetworkFailure {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Unexpected HTTP status {status} from {url}")]
    BadStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Payload {name} not found in archive: {reason}")]
    MissingPayload { name: String, reason: String },

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("Insert of batch {batch} into {table} failed: {source}")]
    InsertFailure {
        table: String,
        batch: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("Promotion of {staging} failed: {source}")]
    PromoteFailure {
        staging: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Could not prepare staging table: {0}")]
    Staging(#[source] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal pipeline error: {0}")]
    Internal(String),
}

impl IngestError {
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::NetworkFailure { .. }
            | IngestError::BadStatus { .. }
            | IngestError::MissingPayload { .. }
            | IngestError::Config(_) => Stage::Fetch,
            IngestError::MalformedRecord { .. } | IngestError::Internal(_) => Stage::Parse,
            IngestError::InsertFailure { .. } | IngestError::Staging(_) => Stage::Load,
            IngestError::PromoteFailure { .. } => Stage::Promote,
        }
    }
}

/// State owned by one ingestion cycle
///
/// Created by the scheduler at the start of every cycle and passed down the
/// pipeline; nothing in here outlives the cycle.
#[derive(Debug, Clone)]
pub struct CycleContext {
    pub id: Uuid,
    /// Server-local calendar day at cycle start, used to tag history rows
    pub day: NaiveDate,
    pub started: Instant,
}

impl CycleContext {
    pub fn new() -> Self {
        Self::for_day(Local::now().date_naive())
    }

    pub fn for_day(day: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            day,
            started: Instant::now(),
        }
    }

    /// Short form of the cycle id, safe to embed in SQL identifiers
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..12].to_string()
    }
}

impl Default for CycleContext {
    fn default() -> Self {
        Self::new()
    }
}
