// src/handlers/enrichment.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    error::AppError,
    services::enrichment::{EnrichmentHandle, Submission},
};

/// POST /api/comments/analyze
///
/// Queues a sentiment run over all pending comments and returns at once.
pub async fn analyze(State(enrichment): State<EnrichmentHandle>) -> Result<Response, AppError> {
    match enrichment.submit().await? {
        Submission::NothingToDo => Ok(Json(json!({
            "message": "No pending comments to analyze",
        }))
        .into_response()),
        Submission::Queued(run) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "message": "Sentiment analysis started in the background",
                "run": run,
            })),
        )
            .into_response()),
    }
}

/// GET /api/comments/analyze/latest
pub async fn latest_run(
    State(enrichment): State<EnrichmentHandle>,
) -> Result<impl IntoResponse, AppError> {
    let run = enrichment
        .latest()
        .await
        .ok_or(AppError::NotFound("No enrichment run yet".to_string()))?;

    Ok(Json(run))
}

/// GET /api/comments/analyze/runs/{id}
pub async fn get_run(
    State(enrichment): State<EnrichmentHandle>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let run = enrichment
        .status(id)
        .await
        .ok_or(AppError::NotFound(format!("Enrichment run {} not found", id)))?;

    Ok(Json(run))
}
