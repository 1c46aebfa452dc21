// src/handlers/comments.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use super::moderation::bulk_body;
use crate::{
    error::AppError,
    models::comment::{BulkIdsRequest, CommentDetails, LifecycleTable, SourceQuery},
    services::moderation::ModerationEngine,
};

/// GET /comments/{type}
/// Lists one lifecycle table (`main`, `good` or `bad`) of a source.
pub async fn list_comments(
    State(engine): State<ModerationEngine>,
    Path(table): Path<LifecycleTable>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let comments = engine
        .store()
        .list(query.source, table)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list {} comments: {:?}", table.as_str(), e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(comments))
}

/// GET /api/comments/{video_id}/details
/// First comment of a video plus every reply, across all lifecycle tables.
pub async fn get_details(
    State(engine): State<ModerationEngine>,
    Path(video_id): Path<i64>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    let comments = engine
        .store()
        .list_for_video(query.source, video_id)
        .await?;

    let details = CommentDetails::from_comments(video_id, &comments).ok_or(AppError::NotFound(
        format!("No comments found for video {}", video_id),
    ))?;

    Ok(Json(details))
}

/// DELETE /comments/{type}/{id}
pub async fn delete_comment(
    State(engine): State<ModerationEngine>,
    Path((table, id)): Path<(LifecycleTable, i64)>,
    Query(query): Query<SourceQuery>,
) -> Result<impl IntoResponse, AppError> {
    engine.delete(query.source, table, id).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Comment {} deleted", id),
        "id": id,
    })))
}

/// POST /comments/{type}/bulk-delete
pub async fn bulk_delete(
    State(engine): State<ModerationEngine>,
    Path(table): Path<LifecycleTable>,
    Query(query): Query<SourceQuery>,
    Json(payload): Json<BulkIdsRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let outcome = engine
        .delete_many(query.source, table, &payload.ids)
        .await?;

    Ok(Json(bulk_body("deleted", &outcome)))
}
