//! One ingestion cycle: fetch → parse → load → promote

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::scheduler::CycleRunner;
use super::{
    ArchiveFetcher, BulkLoader, CycleContext, IngestConfig, IngestError, IngestResult, LoadStats,
    PayloadArchive, PromoteStats, RankingStore, StagingArea, SwapCoordinator,
};

/// Records buffered between the parser thread and the loader.
const PARSE_CHANNEL_CAPACITY: usize = 20_000;

/// Summary of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub cycle_id: Uuid,
    pub day: NaiveDate,
    pub records: u64,
    pub batches: u64,
    pub promoted: PromoteStats,
    pub elapsed: Duration,
}

/// The full ingestion pipeline for one configured source
pub struct IngestPipeline {
    config: IngestConfig,
    fetcher: ArchiveFetcher,
    loader: BulkLoader,
    store: Arc<dyn RankingStore>,
}

impl IngestPipeline {
    pub fn new(config: IngestConfig, store: Arc<dyn RankingStore>) -> IngestResult<Self> {
        config
            .validate()
            .map_err(|e| IngestError::Config(e.to_string()))?;

        Ok(Self {
            fetcher: ArchiveFetcher::new(config.http_timeout())?,
            loader: BulkLoader::new(config.batch_size),
            config,
            store,
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Run one complete cycle
    ///
    /// Nothing in the live tables changes unless every record was parsed
    /// and loaded and the promote transaction committed. Staging is dropped
    /// when parsing or loading fails and kept when the promote fails.
    #[instrument(skip_all, fields(cycle_id = %ctx.id, day = %ctx.day))]
    pub async fn run_cycle(&self, ctx: &CycleContext) -> IngestResult<CycleStats> {
        info!(url = %self.config.zip_url, "Starting ingestion cycle");

        let body = self.fetcher.fetch(&self.config.zip_url).await?;
        let archive = PayloadArchive::open(body, &self.config.payload_name)?;

        let mut staging = self
            .store
            .create_staging(ctx)
            .await
            .map_err(IngestError::Staging)?;

        let load = match self.fill_staging(archive, staging.as_mut()).await {
            Ok(load) => load,
            Err(e) => {
                if let Err(drop_err) = staging.discard().await {
                    warn!(staging = staging.name(), error = %drop_err, "Failed to drop staging table");
                }
                return Err(e);
            }
        };

        info!(
            staging = staging.name(),
            records = load.records,
            batches = load.batches,
            "Loaded staging table"
        );

        let promoted = SwapCoordinator::new(self.config.promote_plan(ctx))
            .swap(staging.as_mut())
            .await?;

        Ok(CycleStats {
            cycle_id: ctx.id,
            day: ctx.day,
            records: load.records,
            batches: load.batches,
            promoted,
            elapsed: ctx.started.elapsed(),
        })
    }

    /// Parse the payload into `staging` and check that every record landed
    async fn fill_staging(
        &self,
        archive: PayloadArchive,
        staging: &mut dyn StagingArea,
    ) -> IngestResult<LoadStats> {
        let (tx, rx) = mpsc::channel(PARSE_CHANNEL_CAPACITY);
        let producer = tokio::task::spawn_blocking(move || archive.stream_records(&tx));

        let loaded = self.loader.load(ReceiverStream::new(rx), staging).await;
        let parsed = producer
            .await
            .map_err(|e| IngestError::Internal(format!("parser task failed: {}", e)))?;

        let load = loaded?;
        let parsed = parsed?;

        if parsed != load.records {
            return Err(IngestError::Internal(format!(
                "parsed {} records but loaded {}",
                parsed, load.records
            )));
        }
        if load.records == 0 {
            return Err(IngestError::MalformedRecord {
                line: 0,
                reason: format!("{} contains no records", self.config.payload_name),
            });
        }

        Ok(load)
    }
}

#[async_trait]
impl CycleRunner for IngestPipeline {
    async fn run_cycle(&self, ctx: &CycleContext) -> IngestResult<CycleStats> {
        IngestPipeline::run_cycle(self, ctx).await
    }
}
