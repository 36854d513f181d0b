//! Promotion of a fully loaded staging table into the live tables
//!
//! Readers of `current` see either the previous snapshot or the new one,
//! never a mix: the merge and the history append commit together.
//!
//! Domains that dropped out of the list keep their last known rank in
//! `current`. Rows are upserted, never deleted.

use chrono::NaiveDate;
use sqlx::PgConnection;
use tracing::{info, warn};

use super::storage::{quote_ident, StagingArea};
use super::{IngestError, IngestResult};

/// What to do with a loaded staging table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotePlan {
    /// Upsert every staged row into the current table
    pub update_current: bool,
    /// Append every staged row to the history table under this day
    pub history_day: Option<NaiveDate>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PromoteStats {
    pub current_rows: u64,
    pub history_rows: u64,
}

/// Runs the promote step for one cycle and cleans up afterwards
#[derive(Debug, Clone, Copy)]
pub struct SwapCoordinator {
    plan: PromotePlan,
}

impl SwapCoordinator {
    pub fn new(plan: PromotePlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &PromotePlan {
        &self.plan
    }

    /// Promote `staging`, then discard it
    ///
    /// On failure the staging table is left alone and nothing in the live
    /// tables changes. A failed discard after a successful promote is only
    /// logged; the new data is already live.
    pub async fn swap(&self, staging: &mut dyn StagingArea) -> IngestResult<PromoteStats> {
        let stats = staging
            .promote(&self.plan)
            .await
            .map_err(|source| IngestError::PromoteFailure {
                staging: staging.name().to_string(),
                source,
            })?;

        info!(
            staging = staging.name(),
            current_rows = stats.current_rows,
            history_rows = stats.history_rows,
            "Promoted staging table"
        );

        if let Err(e) = staging.discard().await {
            warn!(staging = staging.name(), error = %e, "Failed to drop staging table");
        }

        Ok(stats)
    }
}

/// Upsert every staged row into `current`
pub(crate) async fn merge_into_current(
    conn: &mut PgConnection,
    staging: &str,
    current: &str,
) -> sqlx::Result<u64> {
    let sql = format!(
        r#"
        INSERT INTO {current} (domain, rank, updated_at)
        SELECT domain, rank, now() FROM {staging}
        ON CONFLICT (domain) DO UPDATE
        SET rank = EXCLUDED.rank, updated_at = EXCLUDED.updated_at
        "#,
        current = quote_ident(current),
        staging = quote_ident(staging),
    );

    let result = sqlx::query(&sql).execute(conn).await?;
    Ok(result.rows_affected())
}

/// Copy every staged row into the history table tagged with `day`
///
/// A second run on the same day overwrites that day's ranks.
pub(crate) async fn append_history(
    conn: &mut PgConnection,
    staging: &str,
    history: &str,
    day: NaiveDate,
) -> sqlx::Result<u64> {
    let sql = format!(
        r#"
        INSERT INTO {history} (name, rank, day)
        SELECT domain, rank, $1 FROM {staging}
        ON CONFLICT (name, day) DO UPDATE
        SET rank = EXCLUDED.rank
        "#,
        history = quote_ident(history),
        staging = quote_ident(staging),
    );

    let result = sqlx::query(&sql).bind(day).execute(conn).await?;
    Ok(result.rows_affected())
}

pub(crate) async fn drop_table(conn: &mut PgConnection, table: &str) -> sqlx::Result<()> {
    let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
    sqlx::query(&sql).execute(conn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use u1m_common::types::RankedEntry;

    #[derive(Default)]
    struct FakeStaging {
        fail_promote: bool,
        fail_discard: bool,
        promoted: Option<PromotePlan>,
        discarded: bool,
    }

    #[async_trait]
    impl StagingArea for FakeStaging {
        fn name(&self) -> &str {
            "fake_staging"
        }

        async fn insert_batch(&mut self, rows: &[RankedEntry]) -> sqlx::Result<u64> {
            Ok(rows.len() as u64)
        }

        async fn promote(&mut self, plan: &PromotePlan) -> sqlx::Result<PromoteStats> {
            if self.fail_promote {
                return Err(sqlx::Error::Protocol("promote refused".to_string()));
            }
            self.promoted = Some(*plan);
            Ok(PromoteStats {
                current_rows: 2,
                history_rows: if plan.history_day.is_some() { 2 } else { 0 },
            })
        }

        async fn discard(&mut self) -> sqlx::Result<()> {
            if self.fail_discard {
                return Err(sqlx::Error::Protocol("drop refused".to_string()));
            }
            self.discarded = true;
            Ok(())
        }
    }

    fn plan() -> PromotePlan {
        PromotePlan {
            update_current: true,
            history_day: NaiveDate::from_ymd_opt(2026, 5, 1),
        }
    }

    #[tokio::test]
    async fn test_swap_promotes_then_discards() {
        let mut staging = FakeStaging::default();
        let stats = SwapCoordinator::new(plan()).swap(&mut staging).await.unwrap();

        assert_eq!(stats.current_rows, 2);
        assert_eq!(stats.history_rows, 2);
        assert_eq!(staging.promoted, Some(plan()));
        assert!(staging.discarded);
    }

    #[tokio::test]
    async fn test_failed_promote_keeps_staging() {
        let mut staging = FakeStaging {
            fail_promote: true,
            ..Default::default()
        };
        let err = SwapCoordinator::new(plan()).swap(&mut staging).await.unwrap_err();

        match err {
            IngestError::PromoteFailure { staging: name, .. } => assert_eq!(name, "fake_staging"),
            other => panic!("expected PromoteFailure, got {:?}", other),
        }
        assert!(!staging.discarded);
    }

    #[tokio::test]
    async fn test_failed_discard_is_not_an_error() {
        let mut staging = FakeStaging {
            fail_discard: true,
            ..Default::default()
        };
        let stats = SwapCoordinator::new(plan()).swap(&mut staging).await.unwrap();
        assert_eq!(stats.current_rows, 2);
        assert!(staging.promoted.is_some());
    }
}
