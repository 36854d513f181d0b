//! Batched bulk load into the staging table

use futures::{Stream, StreamExt};
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::debug;
use u1m_common::types::RankedEntry;

use super::storage::{quote_ident, StagingArea};
use super::{IngestError, IngestResult, MAX_BATCH_SIZE};

/// Totals for one load
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadStats {
    pub records: u64,
    pub batches: u64,
}

/// Groups records into fixed-size batches and writes each as one insert
#[derive(Debug, Clone, Copy)]
pub struct BulkLoader {
    batch_size: usize,
}

impl BulkLoader {
    /// `batch_size` is clamped to `1..=MAX_BATCH_SIZE`
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Write every record from `records` into `staging`
    ///
    /// Stops at the first failed insert. Rows from earlier batches stay in
    /// staging; the caller decides what happens to it.
    pub async fn load<S>(
        &self,
        mut records: S,
        staging: &mut dyn StagingArea,
    ) -> IngestResult<LoadStats>
    where
        S: Stream<Item = RankedEntry> + Unpin,
    {
        let mut stats = LoadStats::default();
        let mut batch = Vec::with_capacity(self.batch_size);

        while let Some(entry) = records.next().await {
            batch.push(entry);
            if batch.len() == self.batch_size {
                self.flush(&mut batch, staging, &mut stats).await?;
            }
        }

        if !batch.is_empty() {
            self.flush(&mut batch, staging, &mut stats).await?;
        }

        debug!(
            staging = staging.name(),
            records = stats.records,
            batches = stats.batches,
            "Staging load complete"
        );
        Ok(stats)
    }

    async fn flush(
        &self,
        batch: &mut Vec<RankedEntry>,
        staging: &mut dyn StagingArea,
        stats: &mut LoadStats,
    ) -> IngestResult<()> {
        let number = stats.batches + 1;
        let written = staging
            .insert_batch(batch)
            .await
            .map_err(|source| IngestError::InsertFailure {
                table: staging.name().to_string(),
                batch: number,
                source,
            })?;

        stats.records += written;
        stats.batches = number;
        batch.clear();
        Ok(())
    }
}

/// One multi-row `INSERT` of `rows` into `table`
pub(crate) async fn insert_rows(
    conn: &mut PgConnection,
    table: &str,
    rows: &[RankedEntry],
) -> sqlx::Result<u64> {
    if rows.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} (rank, domain) ", quote_ident(table)));
    builder.push_values(rows, |mut row, entry| {
        row.push_bind(entry.rank).push_bind(&entry.name);
    });

    let result = builder.build().execute(conn).await?;
    Ok(result.rows_affected())
}
