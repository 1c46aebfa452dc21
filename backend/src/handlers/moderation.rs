// src/handlers/moderation.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::comment::{BulkIdsRequest, SourceQuery},
    services::moderation::{BulkOutcome, ModerationEngine, Transition},
    utils::jwt::Claims,
};

/// POST /approve/{id}
pub async fn approve(
    State(engine): State<ModerationEngine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    transition_one(&engine, &claims, Transition::Approve, id, query).await
}

/// POST /reject/{id}
pub async fn reject(
    State(engine): State<ModerationEngine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    transition_one(&engine, &claims, Transition::Reject, id, query).await
}

/// POST /undo/{id}
/// Moves the comment back to pending from wherever it currently is.
pub async fn undo(
    State(engine): State<ModerationEngine>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    transition_one(&engine, &claims, Transition::Undo, id, query).await
}

/// POST /bulk/approve
pub async fn bulk_approve(
    State(engine): State<ModerationEngine>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SourceQuery>,
    Json(payload): Json<BulkIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    transition_many(&engine, &claims, Transition::Approve, query, payload).await
}

/// POST /bulk/reject
pub async fn bulk_reject(
    State(engine): State<ModerationEngine>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SourceQuery>,
    Json(payload): Json<BulkIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    transition_many(&engine, &claims, Transition::Reject, query, payload).await
}

/// POST /bulk/undo
pub async fn bulk_undo(
    State(engine): State<ModerationEngine>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SourceQuery>,
    Json(payload): Json<BulkIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    transition_many(&engine, &claims, Transition::Undo, query, payload).await
}

async fn transition_one(
    engine: &ModerationEngine,
    claims: &Claims,
    transition: Transition,
    id: i64,
    query: SourceQuery,
) -> Result<Json<serde_json::Value>, AppError> {
    let moved = engine.apply(transition, query.source, id).await?;
    tracing::debug!(moderator = %claims.username, comment_id = id, "transition requested");

    Ok(Json(json!({
        "success": true,
        "message": format!("Comment {} {}", id, transition.verb()),
        "id": moved.id,
        "from": moved.from,
        "to": moved.to,
    })))
}

async fn transition_many(
    engine: &ModerationEngine,
    claims: &Claims,
    transition: Transition,
    query: SourceQuery,
    payload: BulkIdsRequest,
) -> Result<Json<serde_json::Value>, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = engine
        .apply_many(transition, query.source, &payload.ids)
        .await?;
    tracing::debug!(moderator = %claims.username, requested = payload.ids.len(), "bulk transition requested");

    Ok(Json(bulk_body(transition.verb(), &outcome)))
}

/// Shared response body for bulk endpoints.
pub fn bulk_body(verb: &str, outcome: &BulkOutcome) -> serde_json::Value {
    let message = if outcome.not_found.is_empty() {
        format!("{} comment(s) {}", outcome.moved.len(), verb)
    } else {
        format!(
            "{} comment(s) {}, {} not found",
            outcome.moved.len(),
            verb,
            outcome.not_found.len()
        )
    };

    json!({
        "success": true,
        "message": message,
        "moved": outcome.moved,
        "not_found": outcome.not_found,
    })
}
