// tests/enrichment_tests.rs

mod common;

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use backend::{
    config::EnrichmentConfig,
    db::CommentStore,
    models::comment::{LifecycleTable, SentimentTag, Source},
    services::{
        ServiceError,
        enrichment::{EnrichmentPipeline, RunRegistry, RunState, RunStatus},
        sentiment::SentimentClassifier,
        translate::{PassthroughTranslator, Translator},
    },
};
use common::{
    GatedClassifier, PrefixTranslator, ScriptedClassifier, TestApp, comment, fast_enrichment,
    seed, spawn_app_with, test_pool,
};

async fn tags(store: &CommentStore, source: Source, table: LifecycleTable) -> Vec<(i64, SentimentTag)> {
    store
        .list(source, table)
        .await
        .unwrap()
        .into_iter()
        .map(|c| (c.id, c.sentiment_tag))
        .collect()
}

/// Runs one queued run to completion on the calling task.
async fn run_once(
    store: &CommentStore,
    translator: Arc<dyn Translator>,
    classifier: Arc<dyn SentimentClassifier>,
    settings: EnrichmentConfig,
) -> RunStatus {
    let runs = RunRegistry::new();
    let pipeline = EnrichmentPipeline::new(store.clone(), translator, classifier, settings, runs.clone());
    let run = runs.enqueue().await.unwrap();
    pipeline.execute(run.id).await.expect("run must exist")
}

#[tokio::test]
async fn batch_labels_map_to_tags_in_order() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    seed(
        &store,
        LifecycleTable::Pending,
        &[
            comment(Source::Native, 1, 1, "first"),
            comment(Source::Native, 2, 1, "second"),
            comment(Source::Native, 3, 1, "third"),
        ],
    )
    .await;
    let classifier =
        Arc::new(ScriptedClassifier::keyword().then(Ok(vec!["negative", "positive", "positive"])));

    let status = run_once(&store, Arc::new(PassthroughTranslator), classifier, fast_enrichment()).await;

    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.batches_total, 1);
    assert_eq!(status.batches_done, 1);
    assert_eq!(status.comments_tagged, 3);
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![
            (1, SentimentTag::Bad),
            (2, SentimentTag::Good),
            (3, SentimentTag::Good)
        ]
    );
}

#[tokio::test]
async fn exhausted_retries_keep_prior_tags() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    let mut tagged = comment(Source::Native, 1, 1, "already tagged");
    tagged.sentiment_tag = SentimentTag::Good;
    seed(
        &store,
        LifecycleTable::Pending,
        &[tagged, comment(Source::Native, 2, 1, "I hate this")],
    )
    .await;
    let classifier = Arc::new(ScriptedClassifier::keyword().failing_times(3));

    let status = run_once(
        &store,
        Arc::new(PassthroughTranslator),
        classifier.clone(),
        fast_enrichment(),
    )
    .await;

    assert_eq!(classifier.calls(), 3);
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.batches_failed, 1);
    assert_eq!(status.batches_done, 0);
    assert!(status.last_error.unwrap().contains("after 3 attempts"));
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Good), (2, SentimentTag::Unset)]
    );
}

#[tokio::test]
async fn classifier_recovers_within_retry_budget() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    seed(&store, LifecycleTable::Pending, &[comment(Source::Native, 1, 1, "awful")]).await;
    let classifier = Arc::new(
        ScriptedClassifier::keyword()
            .failing_times(1)
            .then(Err(ServiceError::Unsuccessful("model loading".to_string()))),
    );

    let status = run_once(
        &store,
        Arc::new(PassthroughTranslator),
        classifier.clone(),
        fast_enrichment(),
    )
    .await;

    assert_eq!(classifier.calls(), 3);
    assert_eq!(status.batches_done, 1);
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Bad)]
    );
}

#[tokio::test]
async fn prediction_count_mismatch_abandons_batch() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    seed(
        &store,
        LifecycleTable::Pending,
        &[
            comment(Source::Native, 1, 1, "a"),
            comment(Source::Native, 2, 1, "b"),
        ],
    )
    .await;
    let classifier = Arc::new(ScriptedClassifier::keyword().then(Ok(vec!["negative"])));

    let status = run_once(&store, Arc::new(PassthroughTranslator), classifier, fast_enrichment()).await;

    assert_eq!(status.batches_failed, 1);
    assert!(status.last_error.unwrap().contains("1 predictions for 2 comments"));
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Unset), (2, SentimentTag::Unset)]
    );
}

#[tokio::test]
async fn non_english_text_is_translated_before_classification() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    seed(
        &store,
        LifecycleTable::Pending,
        &[
            comment(Source::Native, 1, 1, "es: muy bueno"),
            comment(Source::Native, 2, 1, "plain english"),
            comment(Source::Native, 3, 1, "!translation breaks"),
            comment(Source::Native, 4, 1, "?detection breaks"),
        ],
    )
    .await;
    let classifier = Arc::new(ScriptedClassifier::keyword());

    let status = run_once(&store, Arc::new(PrefixTranslator), classifier.clone(), fast_enrichment()).await;

    assert_eq!(status.batches_done, 1);
    assert_eq!(
        classifier.seen(),
        vec![vec![
            "[en] muy bueno".to_string(),
            "plain english".to_string(),
            "!translation breaks".to_string(),
            "?detection breaks".to_string(),
        ]]
    );
    // The stored comment text is never replaced by its translation.
    let stored = store.list(Source::Native, LifecycleTable::Pending).await.unwrap();
    assert_eq!(stored[0].main_comment, "es: muy bueno");
}

#[tokio::test]
async fn batches_fail_independently() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    let comments: Vec<_> = (1..=5)
        .map(|id| comment(Source::Native, id, 1, "I hate it"))
        .collect();
    seed(&store, LifecycleTable::Pending, &comments).await;
    let classifier = Arc::new(
        ScriptedClassifier::keyword()
            .then(Ok(vec!["negative", "negative"]))
            .then(Err(ServiceError::Api(500, "boom".to_string()))),
    );
    let settings = EnrichmentConfig {
        batch_size: 2,
        max_attempts: 1,
        ..fast_enrichment()
    };

    let status = run_once(&store, Arc::new(PassthroughTranslator), classifier.clone(), settings).await;

    assert_eq!(classifier.calls(), 3);
    assert_eq!(status.batches_total, 3);
    assert_eq!(status.batches_done, 2);
    assert_eq!(status.batches_failed, 1);
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![
            (1, SentimentTag::Bad),
            (2, SentimentTag::Bad),
            (3, SentimentTag::Unset),
            (4, SentimentTag::Unset),
            (5, SentimentTag::Bad),
        ]
    );
}

#[tokio::test]
async fn youtube_comments_are_tagged_too() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    seed(&store, LifecycleTable::Pending, &[comment(Source::Native, 1, 1, "nice")]).await;
    seed(&store, LifecycleTable::Pending, &[comment(Source::Youtube, 1, 1, "awful video")]).await;

    let status = run_once(
        &store,
        Arc::new(PassthroughTranslator),
        Arc::new(ScriptedClassifier::keyword()),
        fast_enrichment(),
    )
    .await;

    assert_eq!(status.batches_total, 2);
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Good)]
    );
    assert_eq!(
        tags(&store, Source::Youtube, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Bad)]
    );
}

/// Translator that records how many calls overlap.
#[derive(Default)]
struct CountingTranslator {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Translator for CountingTranslator {
    async fn detect(&self, text: &str) -> Result<String, ServiceError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(if text.starts_with("es:") { "es" } else { "en" }.to_string())
    }

    async fn translate(&self, text: &str, _target: &str) -> Result<String, ServiceError> {
        Ok(text.trim_start_matches("es:").trim().to_string())
    }
}

#[tokio::test]
async fn translation_calls_are_bounded_and_keep_order() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    let comments: Vec<_> = (1..=40)
        .map(|id| comment(Source::Native, id, 1, &format!("es: comment {}", id)))
        .collect();
    seed(&store, LifecycleTable::Pending, &comments).await;
    let translator = Arc::new(CountingTranslator::default());
    let classifier = Arc::new(ScriptedClassifier::keyword());
    let settings = EnrichmentConfig {
        translate_concurrency: 3,
        ..fast_enrichment()
    };

    let status = run_once(&store, translator.clone(), classifier.clone(), settings).await;

    assert_eq!(status.batches_done, 1);
    assert_eq!(translator.peak.load(Ordering::SeqCst), 3);
    let expected: Vec<String> = (1..=40).map(|id| format!("comment {}", id)).collect();
    assert_eq!(classifier.seen(), vec![expected]);
}

struct SlowClassifier;

#[async_trait]
impl SentimentClassifier for SlowClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<String>, ServiceError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(texts.iter().map(|_| "negative".to_string()).collect())
    }
}

#[tokio::test]
async fn run_deadline_marks_run_timed_out() {
    let (pool, _dir) = test_pool().await;
    let store = CommentStore::new(pool);
    seed(&store, LifecycleTable::Pending, &[comment(Source::Native, 1, 1, "slow")]).await;
    let settings = EnrichmentConfig {
        run_deadline: Duration::from_millis(50),
        ..fast_enrichment()
    };

    let status = run_once(&store, Arc::new(PassthroughTranslator), Arc::new(SlowClassifier), settings).await;

    assert_eq!(status.state, RunState::TimedOut);
    assert!(status.finished_at.is_some());
    assert_eq!(
        tags(&store, Source::Native, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Unset)]
    );
}

/// Polls the run until it leaves the queued/running states.
async fn wait_for_run(app: &TestApp, run_id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let run: serde_json::Value = app
            .get(&format!("/api/comments/analyze/runs/{}", run_id))
            .await
            .json()
            .await
            .unwrap();
        if run["state"] != "queued" && run["state"] != "running" {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("run {} did not finish in time", run_id);
}

#[tokio::test]
async fn analyze_with_nothing_pending_is_a_no_op() {
    let app = spawn_app_with(
        Arc::new(PassthroughTranslator),
        Arc::new(ScriptedClassifier::keyword()),
        fast_enrichment(),
    )
    .await;

    let response = app.post("/api/comments/analyze").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "No pending comments to analyze");

    assert_eq!(app.get("/api/comments/analyze/latest").await.status().as_u16(), 404);
}

#[tokio::test]
async fn analyze_runs_in_background_and_reports_status() {
    let classifier = Arc::new(GatedClassifier::closed());
    let app = spawn_app_with(
        Arc::new(PassthroughTranslator),
        classifier.clone(),
        fast_enrichment(),
    )
    .await;
    seed(
        &app.store,
        LifecycleTable::Pending,
        &[
            comment(Source::Native, 1, 1, "one"),
            comment(Source::Native, 2, 1, "two"),
        ],
    )
    .await;

    let response = app.post("/api/comments/analyze").await;
    assert_eq!(response.status().as_u16(), 202);
    let body: serde_json::Value = response.json().await.unwrap();
    let run_id = body["run"]["id"].as_str().unwrap().to_string();

    // The classifier is still blocked, so the first run stays active.
    let conflict = app.post("/api/comments/analyze").await;
    assert_eq!(conflict.status().as_u16(), 409);

    classifier.gate.add_permits(10);
    let run = wait_for_run(&app, &run_id).await;
    assert_eq!(run["state"], "completed");
    assert_eq!(run["batches_done"], 1);
    assert_eq!(run["comments_tagged"], 2);

    let latest: serde_json::Value = app.get("/api/comments/analyze/latest").await.json().await.unwrap();
    assert_eq!(latest["id"], run_id.as_str());

    assert_eq!(
        tags(&app.store, Source::Native, LifecycleTable::Pending).await,
        vec![(1, SentimentTag::Good), (2, SentimentTag::Good)]
    );

    let missing = app
        .get("/api/comments/analyze/runs/00000000-0000-0000-0000-000000000000")
        .await;
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn translate_endpoint_returns_translation_or_502() {
    let app = spawn_app_with(
        Arc::new(PrefixTranslator),
        Arc::new(ScriptedClassifier::keyword()),
        fast_enrichment(),
    )
    .await;

    let body: serde_json::Value = app
        .post_json("/api/translate", serde_json::json!({"text": "es: hola"}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["translatedText"], "[en] hola");

    let failed = app
        .post_json("/api/translate", serde_json::json!({"text": "!bonjour"}))
        .await;
    assert_eq!(failed.status().as_u16(), 502);

    let empty = app
        .post_json("/api/translate", serde_json::json!({"text": ""}))
        .await;
    assert_eq!(empty.status().as_u16(), 400);
}
