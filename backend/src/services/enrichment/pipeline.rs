use std::sync::Arc;

use chrono::Utc;
use futures::{StreamExt, stream};
use thiserror::Error;
use uuid::Uuid;

use super::runs::{RunRegistry, RunState, RunStatus};
use crate::{
    config::EnrichmentConfig,
    db::CommentStore,
    models::comment::{SentimentTag, Source},
    services::{
        ServiceError,
        sentiment::SentimentClassifier,
        translate::{Translator, to_english},
    },
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("sentiment classifier failed after {attempts} attempts: {last}")]
    ClassifierExhausted { attempts: u32, last: ServiceError },

    #[error("classifier returned {got} predictions for {expected} comments")]
    PredictionMismatch { expected: usize, got: usize },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Comments of one source classified together.
#[derive(Debug, Clone)]
pub struct Batch {
    pub source: Source,
    pub items: Vec<(i64, String)>,
}

pub struct EnrichmentPipeline {
    /// Backed by the pipeline's own pool, so a long run never competes
    /// with request handlers for connections.
    store: CommentStore,
    translator: Arc<dyn Translator>,
    classifier: Arc<dyn SentimentClassifier>,
    settings: EnrichmentConfig,
    runs: RunRegistry,
}

impl EnrichmentPipeline {
    pub fn new(
        store: CommentStore,
        translator: Arc<dyn Translator>,
        classifier: Arc<dyn SentimentClassifier>,
        settings: EnrichmentConfig,
        runs: RunRegistry,
    ) -> Self {
        Self {
            store,
            translator,
            classifier,
            settings,
            runs,
        }
    }

    pub fn runs(&self) -> &RunRegistry {
        &self.runs
    }

    /// Runs the pipeline for a queued run under the configured deadline and
    /// returns its final status.
    pub async fn execute(&self, run_id: Uuid) -> Option<RunStatus> {
        self.runs
            .update(run_id, |run| {
                run.state = RunState::Running;
                run.started_at = Some(Utc::now());
            })
            .await?;
        tracing::info!(%run_id, "enrichment run started");

        let outcome = tokio::time::timeout(self.settings.run_deadline, self.process(run_id)).await;

        let status = self
            .runs
            .update(run_id, |run| {
                run.finished_at = Some(Utc::now());
                match outcome {
                    Ok(Ok(())) => run.state = RunState::Completed,
                    Ok(Err(e)) => {
                        run.state = RunState::Failed;
                        run.last_error = Some(e.to_string());
                    }
                    Err(_) => {
                        run.state = RunState::TimedOut;
                        run.last_error = Some(format!(
                            "run exceeded deadline of {}s",
                            self.settings.run_deadline.as_secs()
                        ));
                    }
                }
            })
            .await?;

        tracing::info!(
            %run_id,
            state = status.state.as_str(),
            batches_done = status.batches_done,
            batches_failed = status.batches_failed,
            comments_tagged = status.comments_tagged,
            "enrichment run finished"
        );

        Some(status)
    }

    async fn process(&self, run_id: Uuid) -> Result<(), PipelineError> {
        let batches = self.load_batches().await?;
        let total = batches.len();
        self.runs
            .update(run_id, |run| run.batches_total = total)
            .await;

        if batches.is_empty() {
            tracing::info!(%run_id, "no pending comments to analyze");
            return Ok(());
        }

        // One batch at a time against the external services.
        for (index, batch) in batches.iter().enumerate() {
            match self.process_batch(batch).await {
                Ok(tagged) => {
                    tracing::info!(
                        %run_id,
                        batch = index + 1,
                        total,
                        source = batch.source.as_str(),
                        tagged,
                        "batch tagged"
                    );
                    self.runs
                        .update(run_id, |run| {
                            run.batches_done += 1;
                            run.comments_tagged += tagged;
                        })
                        .await;
                }
                Err(e) => {
                    tracing::error!(
                        %run_id,
                        batch = index + 1,
                        total,
                        source = batch.source.as_str(),
                        error = %e,
                        "batch abandoned"
                    );
                    self.runs
                        .update(run_id, |run| {
                            run.batches_failed += 1;
                            run.last_error = Some(e.to_string());
                        })
                        .await;
                }
            }
        }

        Ok(())
    }

    /// Reads pending comments of both sources and splits them into batches.
    pub async fn load_batches(&self) -> Result<Vec<Batch>, PipelineError> {
        let mut batches = Vec::new();
        for source in Source::ALL {
            let items = self.store.pending_texts(source).await?;
            batches.extend(
                items
                    .chunks(self.settings.batch_size.max(1))
                    .map(|chunk| Batch {
                        source,
                        items: chunk.to_vec(),
                    }),
            );
        }
        Ok(batches)
    }

    /// Translates, classifies and tags one batch. Returns the rows tagged.
    ///
    /// Nothing is written unless every comment of the batch got a label.
    pub async fn process_batch(&self, batch: &Batch) -> Result<u64, PipelineError> {
        let texts = self.prepare_texts(batch).await;
        let predictions = self.classify_with_retry(&texts).await?;

        if predictions.len() != batch.items.len() {
            return Err(PipelineError::PredictionMismatch {
                expected: batch.items.len(),
                got: predictions.len(),
            });
        }

        let tags: Vec<(i64, SentimentTag)> = batch
            .items
            .iter()
            .zip(&predictions)
            .map(|((id, _), label)| (*id, SentimentTag::from_prediction(label)))
            .collect();

        let tagged = self.store.apply_sentiment_tags(batch.source, &tags).await?;
        Ok(tagged)
    }

    /// English text for every comment, in batch order, with at most
    /// `translate_concurrency` translator calls in flight.
    async fn prepare_texts(&self, batch: &Batch) -> Vec<String> {
        let translator = self.translator.as_ref();
        let lookups: Vec<_> = batch
            .items
            .iter()
            .map(|(_, text)| to_english(translator, text))
            .collect();

        stream::iter(lookups)
            .buffered(self.settings.translate_concurrency.max(1))
            .collect()
            .await
    }

    async fn classify_with_retry(&self, texts: &[String]) -> Result<Vec<String>, PipelineError> {
        let attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.classifier.classify(texts).await {
                Ok(predictions) => return Ok(predictions),
                Err(e) if attempt >= attempts => {
                    return Err(PipelineError::ClassifierExhausted { attempts, last: e });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "sentiment request failed, retrying in {:?}",
                        self.settings.retry_backoff
                    );
                    tokio::time::sleep(self.settings.retry_backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
