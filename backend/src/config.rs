// src/config.rs

use std::{env, str::FromStr, time::Duration};

use dotenvy::dotenv;
use thiserror::Error;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub translate: TranslateConfig,
    pub sentiment_api_url: String,
    pub enrichment: EnrichmentConfig,
}

/// Google Cloud Translation v2 settings.
/// Without an API key the service falls back to a passthrough translator.
#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub api_key: Option<String>,
    pub api_url: String,
}

/// Tunables of the background sentiment pipeline.
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    pub batch_size: usize,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    pub run_deadline: Duration,
    /// Detect/translate requests in flight at once within a batch.
    pub translate_concurrency: usize,
    /// Size of the pipeline's own connection pool, separate from the request pool.
    pub db_connections: u32,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            max_attempts: 3,
            retry_backoff: Duration::from_secs(2),
            run_deadline: Duration::from_secs(30 * 60),
            translate_concurrency: 8,
            db_connections: 2,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://comments.db".to_string());

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let defaults = EnrichmentConfig::default();
        let enrichment = EnrichmentConfig {
            batch_size: parse_var("ENRICHMENT_BATCH_SIZE", defaults.batch_size)?.max(1),
            max_attempts: parse_var("ENRICHMENT_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            retry_backoff: Duration::from_secs(parse_var(
                "ENRICHMENT_RETRY_BACKOFF_SECS",
                defaults.retry_backoff.as_secs(),
            )?),
            run_deadline: Duration::from_secs(parse_var(
                "ENRICHMENT_RUN_DEADLINE_SECS",
                defaults.run_deadline.as_secs(),
            )?),
            translate_concurrency: parse_var(
                "ENRICHMENT_TRANSLATE_CONCURRENCY",
                defaults.translate_concurrency,
            )?
            .max(1),
            db_connections: parse_var("ENRICHMENT_DB_CONNECTIONS", defaults.db_connections)?
                .max(1),
        };

        Ok(Self {
            database_url,
            jwt_secret,
            jwt_expiration: parse_var("JWT_EXPIRATION", 3600)?,
            rust_log,
            port: parse_var("PORT", 5000)?,
            allowed_origins,
            admin_username: env::var("ADMIN_USERNAME").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
            translate: TranslateConfig {
                api_key: env::var("TRANSLATE_API_KEY").ok().filter(|key| !key.is_empty()),
                api_url: env::var("TRANSLATE_API_URL")
                    .unwrap_or_else(|_| "https://translation.googleapis.com".to_string()),
            },
            sentiment_api_url: env::var("SENTIMENT_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            enrichment,
        })
    }
}

/// Reads an optional variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}
