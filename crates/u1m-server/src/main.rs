//! u1m Server - Main entry point

use anyhow::Result;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tracing::info;
use u1m_common::logging::{init_logging, LogConfig};

use u1m_server::{
    api::{self, AppState},
    config::Config,
    db,
    ingest::{IngestPipeline, IngestScheduler, PgRankingStore},
};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("u1m-server")
        .filter_directives("u1m_server=debug,tower_http=debug,sqlx=warn")
        .build()
        .with_env_overrides()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting u1m server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}",
        config.server.bind_addr()
    );

    let pool = db::create_pool(&config.database).await?;
    db::run_migrations(&pool).await?;

    let _scheduler_handle = if config.ingest.enabled {
        let store = Arc::new(PgRankingStore::new(
            pool.clone(),
            config.ingest.tables.clone(),
        ));
        let pipeline = Arc::new(IngestPipeline::new(config.ingest.clone(), store)?);
        let handle = IngestScheduler::new(pipeline, config.ingest.interval()).start();
        info!(url = %config.ingest.zip_url, "Ingestion scheduler started");
        Some(handle)
    } else {
        info!("Ingestion is disabled (INGEST_ENABLED=false)");
        None
    };

    let state = AppState::new(pool, config.ingest.tables.clone());
    let app = api::router(state, &config.server.static_dir);

    let addr: SocketAddr = config.server.bind_addr().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
