//! Read API
//!
//! | Route              | Response                                    |
//! |--------------------|---------------------------------------------|
//! | `/domain/:domain`  | `{"domain", "rank"}` from the current table |
//! | `/rank/:rank`      | `{"domain", "rank"}` holding that rank      |
//! | `/history/:domain` | `[{"rank", "day"}]`, oldest first           |
//! | `/health`          | 200 when the database answers, 503 if not   |
//!
//! Anything else is served from the static front-end directory.

pub mod handlers;

use axum::{routing::get, Router};
use sqlx::PgPool;
use std::path::Path;
use tower_http::services::ServeDir;

use crate::db::RankingReader;
use crate::ingest::TableNames;
use crate::middleware;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub rankings: RankingReader,
}

impl AppState {
    pub fn new(db: PgPool, tables: TableNames) -> Self {
        Self {
            rankings: RankingReader::new(db.clone(), tables),
            db,
        }
    }
}

/// Build the application router with all routes and middleware
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/domain/:domain", get(handlers::get_domain))
        .route("/rank/:rank", get(handlers::get_rank))
        .route("/history/:domain", get(handlers::get_history))
        .route("/health", get(handlers::health))
        .with_state(state)
        .fallback_service(ServeDir::new(static_dir))
        .layer(middleware::compression_layer())
        .layer(middleware::tracing_layer())
}
