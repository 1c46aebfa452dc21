//! Translation collaborator.
//!
//! Production talks to Google Cloud Translation v2. Deployments without an
//! API key get `PassthroughTranslator`, which treats every text as English.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{ServiceError, check_status};

pub const ENGLISH: &str = "en";

#[async_trait]
pub trait Translator: Send + Sync {
    /// Returns the ISO-639 language code of `text`.
    async fn detect(&self, text: &str) -> Result<String, ServiceError>;

    /// Translates `text` into `target`.
    async fn translate(&self, text: &str, target: &str) -> Result<String, ServiceError>;
}

/// Brings `text` into English for classification.
///
/// Errors at either step fall back to the original text.
pub async fn to_english(translator: &dyn Translator, text: &str) -> String {
    let language = match translator.detect(text).await {
        Ok(language) => language,
        Err(e) => {
            tracing::warn!(error = %e, "language detection failed, keeping original text");
            return text.to_string();
        }
    };

    if language.eq_ignore_ascii_case(ENGLISH) || language.to_ascii_lowercase().starts_with("en-") {
        return text.to_string();
    }

    match translator.translate(text, ENGLISH).await {
        Ok(translated) => translated,
        Err(e) => {
            tracing::warn!(%language, error = %e, "translation failed, keeping original text");
            text.to_string()
        }
    }
}

pub struct PassthroughTranslator;

#[async_trait]
impl Translator for PassthroughTranslator {
    async fn detect(&self, _text: &str) -> Result<String, ServiceError> {
        Ok(ENGLISH.to_string())
    }

    async fn translate(&self, text: &str, _target: &str) -> Result<String, ServiceError> {
        Ok(text.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct GoogleResponse<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct DetectData {
    detections: Vec<Vec<Detection>>,
}

#[derive(Debug, Deserialize)]
struct Detection {
    language: String,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Google Cloud Translation v2 REST client.
pub struct GoogleTranslator {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleTranslator {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Translator for GoogleTranslator {
    async fn detect(&self, text: &str) -> Result<String, ServiceError> {
        let url = format!("{}/language/translate/v2/detect", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "q": text }))
            .send()
            .await?;

        let body: GoogleResponse<DetectData> = check_status(response).await?.json().await?;

        body.data
            .detections
            .into_iter()
            .flatten()
            .next()
            .map(|d| d.language)
            .ok_or_else(|| ServiceError::Parse("empty detection list".to_string()))
    }

    async fn translate(&self, text: &str, target: &str) -> Result<String, ServiceError> {
        let url = format!("{}/language/translate/v2", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&serde_json::json!({ "q": text, "target": target, "format": "text" }))
            .send()
            .await?;

        let body: GoogleResponse<TranslateData> = check_status(response).await?.json().await?;

        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or_else(|| ServiceError::Parse("empty translation list".to_string()))
    }
}
