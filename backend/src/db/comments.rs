use sqlx::{FromRow, Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::schema::{TableLayout, layout};
use crate::models::comment::{Comment, LifecycleTable, SentimentTag, Source};

/// Row shape produced by `TableLayout::canonical_columns`.
#[derive(Debug, FromRow)]
struct CommentRow {
    id: i64,
    video_id: i64,
    main_comment_user: String,
    main_comment: String,
    reply_user: Option<String>,
    reply: Option<String>,
    sentiment_tag: String,
    updated_at: String,
}

impl CommentRow {
    fn into_comment(self, source: Source) -> Comment {
        Comment {
            id: self.id,
            video_id: self.video_id,
            main_comment_user: self.main_comment_user,
            main_comment: self.main_comment,
            reply_user: self.reply_user,
            reply: self.reply,
            sentiment_tag: SentimentTag::from_db(&self.sentiment_tag),
            updated_at: self.updated_at,
            source,
        }
    }
}

/// Access to the six lifecycle tables.
///
/// Pool-level helpers run on their own; the associated functions taking a
/// `SqliteConnection` are building blocks for callers that own a transaction.
#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn list(
        &self,
        source: Source,
        table: LifecycleTable,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        let sql = layout(source, table).select_all();
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into_comment(source)).collect())
    }

    /// All comments of a video across the three tables, oldest first.
    pub async fn list_for_video(
        &self,
        source: Source,
        video_id: i64,
    ) -> Result<Vec<Comment>, sqlx::Error> {
        let mut comments = Vec::new();
        for table in LifecycleTable::ALL {
            let sql = layout(source, table).select_by_video();
            let rows = sqlx::query_as::<_, CommentRow>(&sql)
                .bind(video_id)
                .fetch_all(&self.pool)
                .await?;
            comments.extend(rows.into_iter().map(|r| r.into_comment(source)));
        }
        comments.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));

        Ok(comments)
    }

    /// `(id, text)` of every pending comment of a source.
    pub async fn pending_texts(&self, source: Source) -> Result<Vec<(i64, String)>, sqlx::Error> {
        let sql = layout(source, LifecycleTable::Pending).select_texts();
        sqlx::query_as::<_, (i64, String)>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn count(&self, source: Source, table: LifecycleTable) -> Result<i64, sqlx::Error> {
        let sql = layout(source, table).count();
        sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
    }

    /// Finds the table currently holding `id`, if any.
    pub async fn locate(
        &self,
        source: Source,
        id: i64,
    ) -> Result<Option<LifecycleTable>, sqlx::Error> {
        for table in LifecycleTable::ALL {
            let layout = layout(source, table);
            let sql = format!("SELECT 1 FROM {} WHERE {} = ?", layout.table, layout.id);
            let found = sqlx::query_scalar::<_, i64>(&sql)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
            if found.is_some() {
                return Ok(Some(table));
            }
        }
        Ok(None)
    }

    /// Deletes `id` from `table` and returns the removed row.
    pub async fn take(
        conn: &mut SqliteConnection,
        source: Source,
        table: LifecycleTable,
        id: i64,
    ) -> Result<Option<Comment>, sqlx::Error> {
        let sql = layout(source, table).delete_returning();
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(|r| r.into_comment(source)))
    }

    /// Inserts the full row, unchanged, into `table` of the comment's source.
    pub async fn put(
        conn: &mut SqliteConnection,
        table: LifecycleTable,
        comment: &Comment,
    ) -> Result<(), sqlx::Error> {
        let layout: TableLayout = layout(comment.source, table);
        let sql = layout.insert();

        let mut query = sqlx::query(&sql)
            .bind(comment.id)
            .bind(comment.video_id)
            .bind(comment.main_comment_user.as_str())
            .bind(comment.main_comment.as_str());
        if layout.reply.is_some() {
            query = query
                .bind(comment.reply_user.as_deref())
                .bind(comment.reply.as_deref());
        }
        query
            .bind(comment.sentiment_tag.as_str())
            .bind(comment.updated_at.as_str())
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Permanently deletes `id` from `table`. Returns whether a row went away.
    pub async fn remove(
        conn: &mut SqliteConnection,
        source: Source,
        table: LifecycleTable,
        id: i64,
    ) -> Result<bool, sqlx::Error> {
        let sql = layout(source, table).delete_by_id();
        let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Writes a batch of sentiment tags in one transaction.
    ///
    /// A comment may have been moved since it was read, so each tag is
    /// applied to whichever lifecycle table holds the id. Any error rolls
    /// back the whole batch. Returns the number of rows tagged.
    pub async fn apply_sentiment_tags(
        &self,
        source: Source,
        tags: &[(i64, SentimentTag)],
    ) -> Result<u64, sqlx::Error> {
        let statements: Vec<String> = LifecycleTable::ALL
            .iter()
            .map(|table| layout(source, *table).update_sentiment())
            .collect();

        let mut tx = self.pool.begin().await?;
        let mut tagged = 0;
        for (id, tag) in tags {
            for sql in &statements {
                let result = sqlx::query(sql)
                    .bind(tag.as_str())
                    .bind(*id)
                    .execute(&mut *tx)
                    .await?;
                tagged += result.rows_affected();
            }
        }
        tx.commit().await?;

        Ok(tagged)
    }
}
