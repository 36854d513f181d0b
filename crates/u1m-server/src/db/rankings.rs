//! Read queries against the live ranking tables

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use super::DbResult;
use crate::ingest::storage::quote_ident;
use crate::ingest::TableNames;

/// One row of the current table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct DomainRank {
    pub domain: String,
    pub rank: i32,
}

/// One day of a domain's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct HistoryPoint {
    pub rank: i32,
    pub day: NaiveDate,
}

/// Lookups used by the read API
#[derive(Debug, Clone)]
pub struct RankingReader {
    pool: PgPool,
    tables: TableNames,
}

impl RankingReader {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Current rank of `domain`, if it has ever been loaded
    pub async fn get_domain(&self, domain: &str) -> DbResult<Option<DomainRank>> {
        let sql = format!(
            "SELECT domain, rank FROM {} WHERE domain = $1",
            quote_ident(&self.tables.current)
        );

        let row = sqlx::query_as::<_, DomainRank>(&sql)
            .bind(domain)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Domain currently holding `rank`
    ///
    /// A domain that fell off the list keeps its old rank, so the most
    /// recently updated row wins.
    pub async fn get_rank(&self, rank: i32) -> DbResult<Option<DomainRank>> {
        let sql = format!(
            "SELECT domain, rank FROM {} WHERE rank = $1 ORDER BY updated_at DESC, domain LIMIT 1",
            quote_ident(&self.tables.current)
        );

        let row = sqlx::query_as::<_, DomainRank>(&sql)
            .bind(rank)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Every recorded day for `domain`, oldest first
    pub async fn get_history(&self, domain: &str) -> DbResult<Vec<HistoryPoint>> {
        let sql = format!(
            "SELECT rank, day FROM {} WHERE name = $1 ORDER BY day",
            quote_ident(&self.tables.history)
        );

        let rows = sqlx::query_as::<_, HistoryPoint>(&sql)
            .bind(domain)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
