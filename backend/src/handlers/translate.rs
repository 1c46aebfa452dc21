use std::sync::Arc;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    services::translate::{ENGLISH, Translator},
};

#[derive(Debug, Deserialize, Validate)]
pub struct TranslateRequest {
    #[validate(length(min = 1, max = 5000, message = "text must be between 1 and 5000 characters"))]
    pub text: String,
    /// Target language, English unless given.
    pub target: Option<String>,
}

/// POST /api/translate
pub async fn translate(
    State(translator): State<Arc<dyn Translator>>,
    Json(payload): Json<TranslateRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let target = payload.target.as_deref().unwrap_or(ENGLISH);
    let translated = translator.translate(&payload.text, target).await?;

    Ok(Json(json!({ "translatedText": translated })))
}
