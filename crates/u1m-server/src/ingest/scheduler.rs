//! Interval scheduler
//!
//! Runs one ingestion cycle immediately and then one per interval, forever.
//! Cycles never overlap: the next tick is only awaited after the previous
//! cycle returns, and ticks missed during a long cycle are not replayed.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::{CycleContext, CycleStats, IngestResult};

/// Something that can run one ingestion cycle
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, ctx: &CycleContext) -> IngestResult<CycleStats>;
}

/// Drives a [`CycleRunner`] on a fixed interval
pub struct IngestScheduler<R> {
    runner: Arc<R>,
    interval: Duration,
}

impl<R: CycleRunner> IngestScheduler<R> {
    /// A zero interval is raised to one millisecond
    pub fn new(runner: Arc<R>, interval: Duration) -> Self {
        Self {
            runner,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Spawn the scheduler loop onto the runtime
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Run cycles forever
    pub async fn run(self) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Ingestion scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                debug!(stage = %e.stage(), "Waiting for the next tick after a failed cycle");
            }
        }
    }

    /// Run a single cycle with a fresh context and log the outcome
    pub async fn run_once(&self) -> IngestResult<CycleStats> {
        let ctx = CycleContext::new();

        match self.runner.run_cycle(&ctx).await {
            Ok(stats) => {
                info!(
                    cycle_id = %stats.cycle_id,
                    day = %stats.day,
                    records = stats.records,
                    current_rows = stats.promoted.current_rows,
                    history_rows = stats.promoted.history_rows,
                    elapsed_ms = stats.elapsed.as_millis() as u64,
                    "Ingestion cycle completed"
                );
                Ok(stats)
            },
            Err(e) => {
                error!(
                    cycle_id = %ctx.id,
                    stage = %e.stage(),
                    error = %e,
                    "Ingestion cycle failed"
                );
                Err(e)
            },
        }
    }
}
