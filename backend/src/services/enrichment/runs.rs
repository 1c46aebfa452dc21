use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Finished runs kept around for status queries.
const RETAINED_RUNS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Queued,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl RunState {
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Queued | RunState::Running)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Queued => "queued",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::TimedOut => "timed_out",
        }
    }
}

/// Observable progress of one enrichment run.
#[derive(Debug, Clone, Serialize)]
pub struct RunStatus {
    pub id: Uuid,
    pub state: RunState,
    pub requested_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub batches_total: usize,
    pub batches_done: usize,
    pub batches_failed: usize,
    pub comments_tagged: u64,
    pub last_error: Option<String>,
}

impl RunStatus {
    fn queued() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Queued,
            requested_at: Utc::now(),
            started_at: None,
            finished_at: None,
            batches_total: 0,
            batches_done: 0,
            batches_failed: 0,
            comments_tagged: 0,
            last_error: None,
        }
    }
}

#[derive(Default)]
struct Registry {
    runs: HashMap<Uuid, RunStatus>,
    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,
}

/// In-memory record of enrichment runs, shared by the worker and the handlers.
#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<RwLock<Registry>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new queued run, unless one is already queued or running,
    /// in which case that active run is returned as the error.
    pub async fn enqueue(&self) -> Result<RunStatus, RunStatus> {
        let mut registry = self.inner.write().await;

        if let Some(active) = registry.runs.values().find(|r| r.state.is_active()) {
            return Err(active.clone());
        }

        let run = RunStatus::queued();
        registry.runs.insert(run.id, run.clone());
        registry.order.push_back(run.id);

        while registry.order.len() > RETAINED_RUNS {
            let Some(oldest) = registry.order.pop_front() else {
                break;
            };
            registry.runs.remove(&oldest);
        }

        Ok(run)
    }

    pub async fn get(&self, id: Uuid) -> Option<RunStatus> {
        self.inner.read().await.runs.get(&id).cloned()
    }

    pub async fn latest(&self) -> Option<RunStatus> {
        let registry = self.inner.read().await;
        registry
            .order
            .back()
            .and_then(|id| registry.runs.get(id))
            .cloned()
    }

    /// Applies `f` to the run and returns the updated copy.
    pub async fn update<F>(&self, id: Uuid, f: F) -> Option<RunStatus>
    where
        F: FnOnce(&mut RunStatus),
    {
        let mut registry = self.inner.write().await;
        let run = registry.runs.get_mut(&id)?;
        f(run);
        Some(run.clone())
    }
}
