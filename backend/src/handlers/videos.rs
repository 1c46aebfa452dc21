use axum::{Json, extract::State, response::IntoResponse};
use sqlx::SqlitePool;

use crate::{error::AppError, models::video::Video};

/// GET /api/videos
pub async fn list_videos(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let videos = sqlx::query_as::<_, Video>("SELECT id, url FROM video ORDER BY id")
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list videos: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(videos))
}
