//! Domain types shared by the loader and the read API

use serde::{Deserialize, Serialize};

use crate::error::{Result, U1mError};

/// Highest rank the read API will look up.
pub const MAX_RANK: i64 = 1_000_000;

/// Lowest rank the read API will look up.
pub const MIN_RANK: i64 = 0;

/// Longest domain name accepted by the read API (RFC 1035 limit).
pub const MAX_DOMAIN_LEN: usize = 253;

/// One `(rank, name)` pair from the published list.
///
/// Only ever produced transiently by the parser; the database stores it as a
/// row in the staging, `current` or `ranking` tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RankedEntry {
    pub rank: i32,
    pub name: String,
}

impl RankedEntry {
    pub fn new(rank: i32, name: impl Into<String>) -> Self {
        Self {
            rank,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RankedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.rank, self.name)
    }
}

/// Validate a domain path parameter
///
/// # Rules
/// - Must not be empty
/// - Must not exceed [`MAX_DOMAIN_LEN`] characters
/// - Must contain only ASCII letters, digits, dots and hyphens
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
        return Err(U1mError::InvalidDomain(domain.to_string()));
    }

    if !domain
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(U1mError::InvalidDomain(domain.to_string()));
    }

    Ok(())
}

/// Validate a rank lookup against `[MIN_RANK, MAX_RANK]`
pub fn validate_rank(rank: i64) -> Result<()> {
    if !(MIN_RANK..=MAX_RANK).contains(&rank) {
        return Err(U1mError::RankOutOfRange {
            rank,
            min: MIN_RANK,
            max: MAX_RANK,
        });
    }
    Ok(())
}
