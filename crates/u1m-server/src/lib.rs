//! u1m Server Library
//!
//! Keeps a PostgreSQL copy of the daily top-1M domain list and serves it over
//! HTTP.
//!
//! # Overview
//!
//! - **Ingestion** ([`ingest`]): downloads the published zip archive on a
//!   fixed interval, bulk-loads it into a per-cycle staging table and promotes
//!   it into the live `current` and `ranking` tables in one transaction
//! - **Read API** ([`api`]): domain → rank, rank → domain and per-domain
//!   history lookups, plus a static front-end
//! - **Database** ([`db`]): pool setup, migrations and typed read queries
//! - **Configuration** ([`config`]): environment-based, with `.env` support
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use u1m_server::{config::Config, db, ingest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = db::create_pool(&config.database).await?;
//!     db::run_migrations(&pool).await?;
//!
//!     let store = Arc::new(ingest::PgRankingStore::new(pool, config.ingest.tables.clone()));
//!     let pipeline = ingest::IngestPipeline::new(config.ingest, store)?;
//!     let stats = pipeline.run_cycle(&ingest::CycleContext::new()).await?;
//!     println!("loaded {} records", stats.records);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
