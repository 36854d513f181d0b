//! Standalone loader
//!
//! Runs the ingestion scheduler without the read API, or a single cycle with
//! `--once`.
//!
//! Usage:
//!   u1m-loader                       # cycle now, then every INGEST_INTERVAL_SECS
//!   u1m-loader --once                # one cycle, exit 1 on failure
//!   u1m-loader --once --no-current --history
//!
//! Everything not given on the command line comes from the `INGEST_*`,
//! `DATABASE_*` and `LOG_*` environment variables (and `.env`).

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use u1m_common::logging::{init_logging, LogConfig};

use u1m_server::{
    config::DatabaseConfig,
    db,
    ingest::{IngestConfig, IngestPipeline, IngestScheduler, PgRankingStore},
};

#[derive(Debug, Parser)]
#[command(name = "u1m-loader", version, about = "Load the top-1M domain list into PostgreSQL")]
struct Args {
    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Seconds between cycle starts
    #[arg(long, env = "INGEST_INTERVAL_SECS", value_name = "SECS")]
    interval: Option<u64>,

    /// Archive URL
    #[arg(long, env = "INGEST_ZIP_URL", value_name = "URL")]
    zip_url: Option<String>,

    /// Do not update the current table (INGEST_UPDATE_CURRENT=false)
    #[arg(long)]
    no_current: bool,

    /// Append each load to the history table (INGEST_RECORD_HISTORY=true)
    #[arg(long)]
    history: bool,
}

impl Args {
    fn apply(&self, mut config: IngestConfig) -> IngestConfig {
        if let Some(interval) = self.interval {
            config.interval_secs = interval;
        }
        if let Some(url) = &self.zip_url {
            config.zip_url = url.clone();
        }
        if self.no_current {
            config.update_current = false;
        }
        if self.history {
            config.record_history = true;
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let log_config = LogConfig::builder()
        .log_file_prefix("u1m-loader")
        .filter_directives("u1m_server=debug,sqlx=warn")
        .build()
        .with_env_overrides()?;
    let _log_guard = init_logging(&log_config)?;

    let ingest = args.apply(IngestConfig::from_env()?);
    ingest.validate()?;

    let database = DatabaseConfig::from_env()?;
    let pool = db::create_pool(&database).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgRankingStore::new(pool, ingest.tables.clone()));
    let interval = ingest.interval();
    let pipeline = Arc::new(IngestPipeline::new(ingest, store)?);
    let scheduler = IngestScheduler::new(pipeline, interval);

    if args.once {
        let stats = scheduler.run_once().await?;
        info!(records = stats.records, "Single cycle finished");
        return Ok(());
    }

    tokio::select! {
        _ = scheduler.run() => {},
        result = signal::ctrl_c() => {
            result?;
            info!("Received Ctrl+C, stopping loader");
        },
    }

    Ok(())
}
