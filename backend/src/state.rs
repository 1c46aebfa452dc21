use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::{
    config::Config,
    db::CommentStore,
    services::{
        enrichment::{EnrichmentHandle, EnrichmentPipeline, RunRegistry, spawn_enrichment_worker},
        moderation::ModerationEngine,
        sentiment::SentimentClassifier,
        translate::Translator,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub moderation: ModerationEngine,
    pub translator: Arc<dyn Translator>,
    pub enrichment: EnrichmentHandle,
}

impl AppState {
    /// Wires the engines and spawns the enrichment worker.
    ///
    /// `enrichment_pool` is used only by the background pipeline; request
    /// handlers share `pool`. Must be called inside a tokio runtime.
    pub fn new(
        pool: SqlitePool,
        enrichment_pool: SqlitePool,
        config: Config,
        translator: Arc<dyn Translator>,
        classifier: Arc<dyn SentimentClassifier>,
    ) -> Self {
        let store = CommentStore::new(pool.clone());
        let pipeline = EnrichmentPipeline::new(
            CommentStore::new(enrichment_pool),
            translator.clone(),
            classifier,
            config.enrichment.clone(),
            RunRegistry::new(),
        );
        let enrichment = spawn_enrichment_worker(Arc::new(pipeline), store.clone());

        Self {
            pool,
            config,
            moderation: ModerationEngine::new(store),
            translator,
            enrichment,
        }
    }
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ModerationEngine {
    fn from_ref(state: &AppState) -> Self {
        state.moderation.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Translator> {
    fn from_ref(state: &AppState) -> Self {
        state.translator.clone()
    }
}

impl FromRef<AppState> for EnrichmentHandle {
    fn from_ref(state: &AppState) -> Self {
        state.enrichment.clone()
    }
}
