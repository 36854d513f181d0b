//! Error types shared across u1m crates

use thiserror::Error;

/// Result type alias for u1m operations
pub type Result<T> = std::result::Result<T, U1mError>;

/// Main error type for u1m
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum U1mError {
    #[error("Invalid domain: {0:?}")]
    InvalidDomain(String),

    #[error("Rank {rank} is out of range (expected {min}..={max})")]
    RankOutOfRange { rank: i64, min: i64, max: i64 },

    #[error("Configuration error: {0}")]
    Config(String),
}
