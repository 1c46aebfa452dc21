use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{
    pipeline::EnrichmentPipeline,
    runs::{RunRegistry, RunState, RunStatus},
};
use crate::{
    db::CommentStore,
    error::AppError,
    models::comment::{LifecycleTable, Source},
};

const QUEUE_CAPACITY: usize = 16;

/// Outcome of asking for an enrichment run.
#[derive(Debug, Clone)]
pub enum Submission {
    /// No pending comments, so nothing was queued.
    NothingToDo,
    Queued(RunStatus),
}

/// Cheap handle used by request handlers to schedule and inspect runs.
#[derive(Clone)]
pub struct EnrichmentHandle {
    sender: mpsc::Sender<Uuid>,
    runs: RunRegistry,
    store: CommentStore,
}

/// Starts the single worker task that executes runs in submission order.
///
/// `store` serves the handle's own queries and should sit on the request pool.
pub fn spawn_enrichment_worker(
    pipeline: Arc<EnrichmentPipeline>,
    store: CommentStore,
) -> EnrichmentHandle {
    let (sender, mut receiver) = mpsc::channel::<Uuid>(QUEUE_CAPACITY);
    let handle = EnrichmentHandle {
        sender,
        runs: pipeline.runs().clone(),
        store,
    };

    tokio::spawn(async move {
        while let Some(run_id) = receiver.recv().await {
            if pipeline.execute(run_id).await.is_none() {
                tracing::warn!(%run_id, "enrichment worker skipped unknown run");
            }
        }
        tracing::info!("enrichment worker stopped");
    });

    handle
}

impl EnrichmentHandle {
    /// Queues a run over all pending comments without waiting for it.
    ///
    /// `Conflict` while another run is queued or running.
    pub async fn submit(&self) -> Result<Submission, AppError> {
        let mut pending = 0;
        for source in Source::ALL {
            pending += self.store.count(source, LifecycleTable::Pending).await?;
        }
        if pending == 0 {
            return Ok(Submission::NothingToDo);
        }

        let run = self.runs.enqueue().await.map_err(|active| {
            AppError::Conflict(format!(
                "Enrichment run {} is already {}",
                active.id,
                active.state.as_str()
            ))
        })?;

        if let Err(e) = self.sender.send(run.id).await {
            self.runs
                .update(run.id, |r| {
                    r.state = RunState::Failed;
                    r.finished_at = Some(Utc::now());
                    r.last_error = Some("enrichment worker is not running".to_string());
                })
                .await;
            return Err(AppError::InternalServerError(format!(
                "Failed to queue enrichment run: {}",
                e
            )));
        }

        tracing::info!(run_id = %run.id, pending, "enrichment run queued");
        Ok(Submission::Queued(run))
    }

    pub async fn status(&self, id: Uuid) -> Option<RunStatus> {
        self.runs.get(id).await
    }

    pub async fn latest(&self) -> Option<RunStatus> {
        self.runs.latest().await
    }
}
