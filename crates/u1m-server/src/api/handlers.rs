use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use u1m_common::types::{validate_domain, validate_rank};

use super::AppState;
use crate::db::{self, DomainRank, HistoryPoint};
use crate::error::AppError;

pub async fn get_domain(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<DomainRank>, AppError> {
    validate_domain(&domain)?;

    state
        .rankings
        .get_domain(&domain)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Domain not found".to_string()))
}

pub async fn get_rank(
    State(state): State<AppState>,
    Path(rank): Path<String>,
) -> Result<Json<DomainRank>, AppError> {
    let rank: i64 = rank
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Rank must be an integer, got {:?}", rank)))?;
    validate_rank(rank)?;
    let rank = i32::try_from(rank)
        .map_err(|_| AppError::BadRequest(format!("Rank {} is out of range", rank)))?;

    state
        .rankings
        .get_rank(rank)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Rank not found".to_string()))
}

/// Empty array for a domain with no history; never 404
pub async fn get_history(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<HistoryPoint>>, AppError> {
    validate_domain(&domain)?;
    Ok(Json(state.rankings.get_history(&domain).await?))
}

pub async fn health(State(state): State<AppState>) -> Response {
    match db::health_check(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": "unreachable"
                })),
            )
                .into_response()
        },
    }
}
