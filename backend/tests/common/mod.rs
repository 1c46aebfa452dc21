// tests/common/mod.rs
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use backend::{
    config::{Config, EnrichmentConfig, TranslateConfig},
    db::{self, CommentStore},
    models::comment::{Comment, LifecycleTable, SentimentTag, Source},
    routes,
    services::{
        ServiceError,
        sentiment::SentimentClassifier,
        translate::{PassthroughTranslator, Translator},
    },
    state::AppState,
    utils::jwt::sign_jwt,
};
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const JWT_SECRET: &str = "test_secret_for_integration_tests";

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    /// Pool handed to the enrichment pipeline.
    pub enrichment_pool: SqlitePool,
    pub store: CommentStore,
    pub client: reqwest::Client,
    pub token: String,
    _dir: TempDir,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post(&self, path: &str) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Ids returned by `GET /comments/{type}`.
    pub async fn listed_ids(&self, path: &str) -> Vec<i64> {
        let comments: Vec<serde_json::Value> = self.get(path).await.json().await.unwrap();
        comments.iter().map(|c| c["id"].as_i64().unwrap()).collect()
    }
}

pub fn test_config(enrichment: EnrichmentConfig) -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        allowed_origins: vec!["http://localhost:3000".to_string()],
        admin_username: None,
        admin_password: None,
        translate: TranslateConfig {
            api_key: None,
            api_url: String::new(),
        },
        sentiment_api_url: String::new(),
        enrichment,
    }
}

pub fn fast_enrichment() -> EnrichmentConfig {
    EnrichmentConfig {
        batch_size: 100,
        max_attempts: 3,
        retry_backoff: Duration::from_millis(5),
        run_deadline: Duration::from_secs(10),
        translate_concurrency: 4,
        db_connections: 2,
    }
}

/// Fresh, migrated database in a temporary directory.
pub async fn test_pool() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let pool = open_pool(&dir, 4).await;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    (pool, dir)
}

/// Another pool on the database created by `test_pool`.
pub async fn open_pool(dir: &TempDir, max_connections: u32) -> SqlitePool {
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    db::connect(&url, max_connections)
        .await
        .expect("Failed to open test database")
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(
        Arc::new(PassthroughTranslator),
        Arc::new(ScriptedClassifier::keyword()),
        fast_enrichment(),
    )
    .await
}

/// Spawns the app on a random port with the given collaborators.
pub async fn spawn_app_with(
    translator: Arc<dyn Translator>,
    classifier: Arc<dyn SentimentClassifier>,
    enrichment: EnrichmentConfig,
) -> TestApp {
    let (pool, dir) = test_pool().await;
    let enrichment_pool = open_pool(&dir, enrichment.db_connections).await;

    let state = AppState::new(
        pool.clone(),
        enrichment_pool.clone(),
        test_config(enrichment),
        translator,
        classifier,
    );
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let token = sign_jwt(1, "moderator", "moderator", JWT_SECRET, 600).unwrap();

    TestApp {
        address,
        store: CommentStore::new(pool.clone()),
        pool,
        enrichment_pool,
        client: reqwest::Client::new(),
        token,
        _dir: dir,
    }
}

/// Builds a comment with deterministic fields; `id` also orders `updated_at`.
pub fn comment(source: Source, id: i64, video_id: i64, text: &str) -> Comment {
    Comment {
        id,
        video_id,
        main_comment_user: format!("user_{}", id),
        main_comment: text.to_string(),
        reply_user: None,
        reply: None,
        sentiment_tag: SentimentTag::Unset,
        updated_at: (Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::seconds(id))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string(),
        source,
    }
}

pub async fn seed(store: &CommentStore, table: LifecycleTable, comments: &[Comment]) {
    let mut conn = store.pool().acquire().await.expect("Failed to acquire connection");
    for c in comments {
        CommentStore::put(&mut conn, table, c)
            .await
            .expect("Failed to seed comment");
    }
}

/// Classifier double: replays scripted answers, then labels by keyword.
#[derive(Default)]
pub struct ScriptedClassifier {
    script: Mutex<VecDeque<Result<Vec<String>, ServiceError>>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<String>>>,
}

impl ScriptedClassifier {
    pub fn keyword() -> Self {
        Self::default()
    }

    pub fn then(self, answer: Result<Vec<&str>, ServiceError>) -> Self {
        let answer = answer.map(|labels| labels.into_iter().map(String::from).collect());
        self.script.lock().unwrap().push_back(answer);
        self
    }

    pub fn failing_times(mut self, times: usize) -> Self {
        for _ in 0..times {
            self = self.then(Err(ServiceError::Network("connection refused".to_string())));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Texts received by each call.
    pub fn seen(&self) -> Vec<Vec<String>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl SentimentClassifier for ScriptedClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(texts.to_vec());

        if let Some(answer) = self.script.lock().unwrap().pop_front() {
            return answer;
        }

        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                if lower.contains("awful") || lower.contains("hate") {
                    "negative".to_string()
                } else {
                    "positive".to_string()
                }
            })
            .collect())
    }
}

/// Classifier that blocks until the test releases it.
pub struct GatedClassifier {
    pub gate: tokio::sync::Semaphore,
}

impl GatedClassifier {
    pub fn closed() -> Self {
        Self {
            gate: tokio::sync::Semaphore::new(0),
        }
    }
}

#[async_trait]
impl SentimentClassifier for GatedClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ServiceError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;
        Ok(texts.iter().map(|_| "positive".to_string()).collect())
    }
}

/// Translator double keyed on text prefixes:
/// `es:` is Spanish and translates to `[en] rest`, `!` is French that fails
/// to translate, `?` fails detection, anything else is English.
pub struct PrefixTranslator;

#[async_trait]
impl Translator for PrefixTranslator {
    async fn detect(&self, text: &str) -> Result<String, ServiceError> {
        if text.starts_with("es:") {
            Ok("es".to_string())
        } else if text.starts_with('!') {
            Ok("fr".to_string())
        } else if text.starts_with('?') {
            Err(ServiceError::Api(503, "detect unavailable".to_string()))
        } else {
            Ok("en".to_string())
        }
    }

    async fn translate(&self, text: &str, target: &str) -> Result<String, ServiceError> {
        match text.strip_prefix("es:") {
            Some(rest) => Ok(format!("[{}] {}", target, rest.trim())),
            None if text.starts_with('!') => {
                Err(ServiceError::Unsuccessful("quota exceeded".to_string()))
            }
            None => Ok(text.to_string()),
        }
    }
}
