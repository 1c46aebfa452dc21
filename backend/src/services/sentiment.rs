//! Sentiment classifier collaborator.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ServiceError, check_status};

#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// Classifies every text, returning one label per input in the same order.
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ServiceError>;
}

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    success: bool,
    #[serde(default)]
    predictions: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the `/predict` endpoint of the sentiment model service.
pub struct HttpSentimentClassifier {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpSentimentClassifier {
    pub fn new(base_url: &str) -> Result<Self, ServiceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ServiceError> {
        let url = format!("{}/predict", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .json(&PredictRequest { texts })
            .send()
            .await?;

        let body: PredictResponse = check_status(response).await?.json().await?;
        if !body.success {
            return Err(ServiceError::Unsuccessful(
                body.error.unwrap_or_else(|| "no error message".to_string()),
            ));
        }

        Ok(body.predictions)
    }
}
