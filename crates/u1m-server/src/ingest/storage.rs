//! Staging storage
//!
//! The pipeline only talks to [`RankingStore`] and [`StagingArea`]. The
//! PostgreSQL backend gives every cycle a temporary table on one dedicated
//! pooled connection, so a crashed or abandoned cycle never leaves a
//! permanent table behind.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{Connection, PgPool, Postgres};
use tracing::debug;
use u1m_common::types::RankedEntry;

use super::config::TableNames;
use super::loader::insert_rows;
use super::promote::{append_history, drop_table, merge_into_current, PromotePlan, PromoteStats};
use super::CycleContext;

/// Source of per-cycle staging areas
#[async_trait]
pub trait RankingStore: Send + Sync {
    /// Create an empty staging area for `ctx`
    async fn create_staging(&self, ctx: &CycleContext) -> sqlx::Result<Box<dyn StagingArea>>;
}

/// A private, per-cycle table that nothing outside the cycle can read
#[async_trait]
pub trait StagingArea: Send {
    /// Table name, for logs and errors
    fn name(&self) -> &str;

    /// Insert one batch; returns the number of rows written
    async fn insert_batch(&mut self, rows: &[RankedEntry]) -> sqlx::Result<u64>;

    /// Apply `plan` to the live tables in a single transaction
    ///
    /// Either every change in the plan becomes visible or none does.
    async fn promote(&mut self, plan: &PromotePlan) -> sqlx::Result<PromoteStats>;

    /// Remove the staging data
    async fn discard(&mut self) -> sqlx::Result<()>;
}

/// Double-quote an identifier for interpolation into SQL
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// PostgreSQL-backed [`RankingStore`]
#[derive(Debug, Clone)]
pub struct PgRankingStore {
    pool: PgPool,
    tables: TableNames,
}

impl PgRankingStore {
    pub fn new(pool: PgPool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }
}

#[async_trait]
impl RankingStore for PgRankingStore {
    async fn create_staging(&self, ctx: &CycleContext) -> sqlx::Result<Box<dyn StagingArea>> {
        let mut conn = self.pool.acquire().await?;
        let name = self.tables.staging_for(ctx);

        let sql = format!(
            "CREATE TEMPORARY TABLE {} (LIKE {} INCLUDING ALL)",
            quote_ident(&name),
            quote_ident(&self.tables.current)
        );
        sqlx::query(&sql).execute(&mut *conn).await?;
        debug!(staging = %name, "Created staging table");

        Ok(Box::new(PgStaging {
            conn,
            name,
            tables: self.tables.clone(),
        }))
    }
}

/// Temporary table bound to the connection that created it
///
/// Dropping this without calling [`StagingArea::discard`] returns the
/// connection to the pool with the table still attached. Pooled sessions
/// outlive the cycle, so the pipeline discards staging on every failure
/// except a failed promote.
pub struct PgStaging {
    conn: PoolConnection<Postgres>,
    name: String,
    tables: TableNames,
}

#[async_trait]
impl StagingArea for PgStaging {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_batch(&mut self, rows: &[RankedEntry]) -> sqlx::Result<u64> {
        insert_rows(&mut self.conn, &self.name, rows).await
    }

    async fn promote(&mut self, plan: &PromotePlan) -> sqlx::Result<PromoteStats> {
        let mut tx = self.conn.begin().await?;
        let mut stats = PromoteStats::default();

        if plan.update_current {
            stats.current_rows = merge_into_current(&mut tx, &self.name, &self.tables.current).await?;
        }
        if let Some(day) = plan.history_day {
            stats.history_rows =
                append_history(&mut tx, &self.name, &self.tables.history, day).await?;
        }

        tx.commit().await?;
        Ok(stats)
    }

    async fn discard(&mut self) -> sqlx::Result<()> {
        drop_table(&mut self.conn, &self.name).await
    }
}
