//! Test helpers for u1m server integration tests
//!
//! - [`MemoryStore`]: in-memory `RankingStore` with the same visibility rules
//!   as the PostgreSQL backend, for pipeline tests without a database
//! - [`TestDb`]: per-test live tables in a real database, only when
//!   `DATABASE_URL` is set
//! - [`fixtures`]: in-memory zip archives and a mock archive server
#![allow(dead_code)]

pub mod fixtures;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use u1m_common::types::RankedEntry;
use u1m_server::ingest::{
    CycleContext, PromotePlan, PromoteStats, RankingStore, StagingArea, TableNames,
};
use uuid::Uuid;

pub use fixtures::*;

// ============================================================================
// In-memory store
// ============================================================================

/// Contents of the live tables
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LiveTables {
    pub current: BTreeMap<String, i32>,
    pub history: BTreeMap<(String, NaiveDate), i32>,
}

#[derive(Debug, Default)]
struct MemoryState {
    live: LiveTables,
    stagings_created: usize,
    stagings_discarded: usize,
    insert_statements: usize,
}

/// In-memory [`RankingStore`]
///
/// Staged rows are invisible until `promote`, which applies the whole plan
/// under one lock. Duplicate domains in one staging area are rejected like
/// the primary key on the real table.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_promote: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose promote always fails
    pub fn failing_promote() -> Self {
        Self {
            fail_promote: true,
            ..Default::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().expect("memory store lock poisoned")
    }

    pub fn live(&self) -> LiveTables {
        self.lock().live.clone()
    }

    pub fn rank_of(&self, domain: &str) -> Option<i32> {
        self.lock().live.current.get(domain).copied()
    }

    pub fn domain_at(&self, rank: i32) -> Option<String> {
        self.lock()
            .live
            .current
            .iter()
            .find(|(_, r)| **r == rank)
            .map(|(d, _)| d.clone())
    }

    pub fn history_of(&self, domain: &str) -> Vec<(NaiveDate, i32)> {
        self.lock()
            .live
            .history
            .iter()
            .filter(|((name, _), _)| name == domain)
            .map(|((_, day), rank)| (*day, *rank))
            .collect()
    }

    pub fn stagings_created(&self) -> usize {
        self.lock().stagings_created
    }

    pub fn stagings_discarded(&self) -> usize {
        self.lock().stagings_discarded
    }

    pub fn insert_statements(&self) -> usize {
        self.lock().insert_statements
    }
}

#[async_trait]
impl RankingStore for MemoryStore {
    async fn create_staging(&self, ctx: &CycleContext) -> sqlx::Result<Box<dyn StagingArea>> {
        self.lock().stagings_created += 1;
        Ok(Box::new(MemoryStaging {
            name: TableNames::default().staging_for(ctx),
            rows: Vec::new(),
            seen: HashSet::new(),
            store: self.clone(),
        }))
    }
}

struct MemoryStaging {
    name: String,
    rows: Vec<RankedEntry>,
    seen: HashSet<String>,
    store: MemoryStore,
}

#[async_trait]
impl StagingArea for MemoryStaging {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_batch(&mut self, rows: &[RankedEntry]) -> sqlx::Result<u64> {
        self.store.lock().insert_statements += 1;

        let mut batch_seen = HashSet::new();
        for row in rows {
            if self.seen.contains(&row.name) || !batch_seen.insert(row.name.as_str()) {
                return Err(sqlx::Error::Protocol(format!(
                    "duplicate key value violates unique constraint: {}",
                    row.name
                )));
            }
        }

        for row in rows {
            self.seen.insert(row.name.clone());
            self.rows.push(row.clone());
        }
        Ok(rows.len() as u64)
    }

    async fn promote(&mut self, plan: &PromotePlan) -> sqlx::Result<PromoteStats> {
        if self.store.fail_promote {
            return Err(sqlx::Error::Protocol("could not serialize access".to_string()));
        }

        let mut state = self.store.lock();
        let mut stats = PromoteStats::default();

        if plan.update_current {
            for row in &self.rows {
                state.live.current.insert(row.name.clone(), row.rank);
            }
            stats.current_rows = self.rows.len() as u64;
        }
        if let Some(day) = plan.history_day {
            for row in &self.rows {
                state.live.history.insert((row.name.clone(), day), row.rank);
            }
            stats.history_rows = self.rows.len() as u64;
        }

        Ok(stats)
    }

    async fn discard(&mut self) -> sqlx::Result<()> {
        self.rows.clear();
        self.seen.clear();
        self.store.lock().stagings_discarded += 1;
        Ok(())
    }
}

// ============================================================================
// Real database
// ============================================================================

/// Private live tables for one test in the database at `DATABASE_URL`
///
/// Each instance gets uniquely named copies of the migrated `current` and
/// `ranking` tables, so tests can run in parallel against one database.
pub struct TestDb {
    pool: PgPool,
    tables: TableNames,
}

impl TestDb {
    /// `None` when `DATABASE_URL` is unset; callers skip the test
    pub async fn connect() -> Option<Self> {
        let url = std::env::var("DATABASE_URL").ok()?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("Failed to connect to PostgreSQL");

        u1m_server::db::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let id = Uuid::new_v4().simple().to_string();
        let suffix = &id[..12];
        let tables = TableNames {
            current: format!("t_{}_current", suffix),
            history: format!("t_{}_ranking", suffix),
        };

        for (name, template) in [(&tables.current, "current"), (&tables.history, "ranking")] {
            sqlx::query(&format!(
                "CREATE TABLE \"{}\" (LIKE \"{}\" INCLUDING ALL)",
                name, template
            ))
            .execute(&pool)
            .await
            .expect("Failed to create test table");
        }

        Some(Self { pool, tables })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_cloned(&self) -> PgPool {
        self.pool.clone()
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub async fn current_rows(&self) -> Vec<(String, i32)> {
        sqlx::query_as(&format!(
            "SELECT domain, rank FROM \"{}\" ORDER BY rank, domain",
            self.tables.current
        ))
        .fetch_all(&self.pool)
        .await
        .expect("Failed to read current table")
    }

    pub async fn history_rows(&self) -> Vec<(String, i32, NaiveDate)> {
        sqlx::query_as(&format!(
            "SELECT name, rank, day FROM \"{}\" ORDER BY day, rank",
            self.tables.history
        ))
        .fetch_all(&self.pool)
        .await
        .expect("Failed to read history table")
    }

    /// Temporary staging tables (and their indexes) still present in any session
    pub async fn staging_relations(&self) -> i64 {
        sqlx::query_scalar(
            "SELECT count(*) FROM pg_class \
             WHERE relpersistence = 't' AND starts_with(relname::text, $1)",
        )
        .bind(format!("{}_staging_", self.tables.current))
        .fetch_one(&self.pool)
        .await
        .expect("Failed to query pg_class")
    }

    /// Drop this test's tables
    pub async fn cleanup(self) {
        for name in [&self.tables.current, &self.tables.history] {
            sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", name))
                .execute(&self.pool)
                .await
                .expect("Failed to drop test table");
        }
        self.pool.close().await;
    }
}
