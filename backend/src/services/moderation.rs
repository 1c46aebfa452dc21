//! Moves comments between lifecycle tables.
//!
//! Every move is `DELETE ... RETURNING` on the origin followed by an
//! `INSERT` of the returned row into the destination, inside one
//! transaction. The delete doubles as the existence check: a concurrent
//! mover waits on SQLite's write lock and then sees the row as gone.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::SqliteConnection;

use crate::{
    db::CommentStore,
    error::AppError,
    models::comment::{Comment, LifecycleTable, Source},
};

/// A moderation decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    /// Sends an approved or rejected comment back to pending.
    Undo,
}

impl Transition {
    /// Tables probed, in order, for the comment's current location.
    pub fn origins(self) -> &'static [LifecycleTable] {
        match self {
            Transition::Approve | Transition::Reject => &[LifecycleTable::Pending],
            Transition::Undo => &[LifecycleTable::Approved, LifecycleTable::Rejected],
        }
    }

    pub fn destination(self) -> LifecycleTable {
        match self {
            Transition::Approve => LifecycleTable::Approved,
            Transition::Reject => LifecycleTable::Rejected,
            Transition::Undo => LifecycleTable::Pending,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Transition::Approve => "approved",
            Transition::Reject => "rejected",
            Transition::Undo => "restored to pending",
        }
    }
}

/// Result of a single-comment move.
#[derive(Debug, Clone, Serialize)]
pub struct Moved {
    pub id: i64,
    pub from: LifecycleTable,
    pub to: LifecycleTable,
}

/// Result of a bulk operation: which ids were processed and which were absent.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BulkOutcome {
    pub moved: Vec<i64>,
    pub not_found: Vec<i64>,
}

#[derive(Clone)]
pub struct ModerationEngine {
    store: CommentStore,
}

impl ModerationEngine {
    pub fn new(store: CommentStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &CommentStore {
        &self.store
    }

    pub async fn approve(&self, source: Source, id: i64) -> Result<Moved, AppError> {
        self.apply(Transition::Approve, source, id).await
    }

    pub async fn reject(&self, source: Source, id: i64) -> Result<Moved, AppError> {
        self.apply(Transition::Reject, source, id).await
    }

    pub async fn undo(&self, source: Source, id: i64) -> Result<Moved, AppError> {
        self.apply(Transition::Undo, source, id).await
    }

    /// Moves one comment. `NotFound` when it is in none of the origin tables.
    pub async fn apply(
        &self,
        transition: Transition,
        source: Source,
        id: i64,
    ) -> Result<Moved, AppError> {
        let mut tx = self.store.begin().await?;

        let Some((from, comment)) = take_from_origins(&mut tx, transition, source, id).await?
        else {
            tx.rollback().await?;
            return Err(self.not_found(transition, source, id).await);
        };

        let to = transition.destination();
        CommentStore::put(&mut tx, to, &comment).await?;
        tx.commit().await?;

        tracing::info!(
            comment_id = id,
            source = source.as_str(),
            from = from.as_str(),
            to = to.as_str(),
            "comment moved"
        );

        Ok(Moved { id, from, to })
    }

    /// Moves many comments in one transaction.
    ///
    /// Missing ids are reported in `not_found` rather than failing the call.
    /// A database error rolls back every move of the request.
    pub async fn apply_many(
        &self,
        transition: Transition,
        source: Source,
        ids: &[i64],
    ) -> Result<BulkOutcome, AppError> {
        let ids = dedup(ids);
        let to = transition.destination();
        let mut outcome = BulkOutcome::default();

        let mut tx = self.store.begin().await?;
        for id in ids {
            match take_from_origins(&mut tx, transition, source, id).await? {
                Some((_, comment)) => {
                    CommentStore::put(&mut tx, to, &comment).await?;
                    outcome.moved.push(id);
                }
                None => outcome.not_found.push(id),
            }
        }
        tx.commit().await?;

        tracing::info!(
            source = source.as_str(),
            to = to.as_str(),
            moved = outcome.moved.len(),
            not_found = outcome.not_found.len(),
            "bulk transition committed"
        );

        Ok(outcome)
    }

    /// Names where a comment that missed its origin tables actually is.
    async fn not_found(&self, transition: Transition, source: Source, id: i64) -> AppError {
        let location = match self.store.locate(source, id).await {
            Ok(Some(table)) => format!("it is {}", table.as_str()),
            Ok(None) => "it does not exist".to_string(),
            Err(e) => {
                tracing::warn!(comment_id = id, error = %e, "failed to locate comment");
                "its location is unknown".to_string()
            }
        };

        AppError::NotFound(format!(
            "Comment {} not found in {}; {}",
            id,
            origin_names(transition),
            location
        ))
    }

    /// Permanently deletes one comment from `table`.
    pub async fn delete(
        &self,
        source: Source,
        table: LifecycleTable,
        id: i64,
    ) -> Result<(), AppError> {
        let mut conn = self.store.pool().acquire().await?;
        if !CommentStore::remove(&mut conn, source, table, id).await? {
            return Err(AppError::NotFound(format!(
                "Comment {} not found in {}",
                id,
                table.as_str()
            )));
        }

        tracing::info!(comment_id = id, source = source.as_str(), table = table.as_str(), "comment deleted");
        Ok(())
    }

    pub async fn delete_many(
        &self,
        source: Source,
        table: LifecycleTable,
        ids: &[i64],
    ) -> Result<BulkOutcome, AppError> {
        let mut outcome = BulkOutcome::default();

        let mut tx = self.store.begin().await?;
        for id in dedup(ids) {
            if CommentStore::remove(&mut tx, source, table, id).await? {
                outcome.moved.push(id);
            } else {
                outcome.not_found.push(id);
            }
        }
        tx.commit().await?;

        tracing::info!(
            source = source.as_str(),
            table = table.as_str(),
            deleted = outcome.moved.len(),
            not_found = outcome.not_found.len(),
            "bulk delete committed"
        );

        Ok(outcome)
    }
}

/// Removes the comment from the first origin table that holds it.
async fn take_from_origins(
    conn: &mut SqliteConnection,
    transition: Transition,
    source: Source,
    id: i64,
) -> Result<Option<(LifecycleTable, Comment)>, sqlx::Error> {
    for origin in transition.origins() {
        if let Some(comment) = CommentStore::take(conn, source, *origin, id).await? {
            return Ok(Some((*origin, comment)));
        }
    }
    Ok(None)
}

fn origin_names(transition: Transition) -> String {
    transition
        .origins()
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" or ")
}

/// Keeps the first occurrence of every id.
fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
