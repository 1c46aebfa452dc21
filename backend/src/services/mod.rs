pub mod enrichment;
pub mod moderation;
pub mod sentiment;
pub mod translate;

use thiserror::Error;

/// Failures talking to the translate or sentiment services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Network communication error
    #[error("network error: {0}")]
    Network(String),

    /// Service answered with a non-success HTTP status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Service answered but flagged the request as failed
    #[error("service reported failure: {0}")]
    Unsuccessful(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ServiceError::Parse(err.to_string())
        } else {
            ServiceError::Network(err.to_string())
        }
    }
}

/// Turns a non-2xx response into `ServiceError::Api`.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Api(status.as_u16(), body))
}
