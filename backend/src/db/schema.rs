//! Column layout of the lifecycle tables.
//!
//! Native and YouTube tables store the same data under different column
//! names. Everything above this module sees the canonical `Comment` shape;
//! SQL built here only ever interpolates the `&'static str` names below.

use crate::models::comment::{LifecycleTable, Source};

/// Physical layout of one lifecycle table.
#[derive(Debug, Clone, Copy)]
pub struct TableLayout {
    pub table: &'static str,
    pub id: &'static str,
    pub video_id: &'static str,
    pub author: &'static str,
    pub text: &'static str,
    /// YouTube tables carry no reply columns.
    pub reply: Option<(&'static str, &'static str)>,
    pub updated_at: &'static str,
}

const NATIVE: TableLayout = TableLayout {
    table: "",
    id: "id",
    video_id: "video_id",
    author: "main_comment_user",
    text: "main_comment",
    reply: Some(("reply_user", "reply")),
    updated_at: "updated_at",
};

const YOUTUBE: TableLayout = TableLayout {
    table: "",
    id: "comment_id",
    video_id: "video_db_id",
    author: "author",
    text: "text",
    reply: None,
    updated_at: "time",
};

pub fn layout(source: Source, table: LifecycleTable) -> TableLayout {
    let (base, name) = match (source, table) {
        (Source::Native, LifecycleTable::Pending) => (NATIVE, "comments_pending"),
        (Source::Native, LifecycleTable::Approved) => (NATIVE, "comments_approved"),
        (Source::Native, LifecycleTable::Rejected) => (NATIVE, "comments_rejected"),
        (Source::Youtube, LifecycleTable::Pending) => (YOUTUBE, "youtube_comments_pending"),
        (Source::Youtube, LifecycleTable::Approved) => (YOUTUBE, "youtube_comments_approved"),
        (Source::Youtube, LifecycleTable::Rejected) => (YOUTUBE, "youtube_comments_rejected"),
    };
    TableLayout { table: name, ..base }
}

impl TableLayout {
    /// Select list producing canonical column names.
    pub fn canonical_columns(&self) -> String {
        let (reply_user, reply) = match self.reply {
            Some((user, text)) => (user.to_string(), text.to_string()),
            None => ("NULL".to_string(), "NULL".to_string()),
        };
        format!(
            "{} AS id, {} AS video_id, {} AS main_comment_user, {} AS main_comment, \
             {} AS reply_user, {} AS reply, sentiment_tag, {} AS updated_at",
            self.id, self.video_id, self.author, self.text, reply_user, reply, self.updated_at
        )
    }

    pub fn select_all(&self) -> String {
        format!(
            "SELECT {} FROM {} ORDER BY {} ASC, {} ASC",
            self.canonical_columns(),
            self.table,
            self.updated_at,
            self.id
        )
    }

    pub fn select_by_video(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.canonical_columns(),
            self.table,
            self.video_id
        )
    }

    pub fn select_texts(&self) -> String {
        format!(
            "SELECT {} AS id, {} AS text FROM {} ORDER BY {} ASC",
            self.id, self.text, self.table, self.id
        )
    }

    /// Removes one row and hands it back, which makes the delete the existence check.
    pub fn delete_returning(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = ? RETURNING {}",
            self.table,
            self.id,
            self.canonical_columns()
        )
    }

    pub fn delete_by_id(&self) -> String {
        format!("DELETE FROM {} WHERE {} = ?", self.table, self.id)
    }

    /// Insert binding, in order: id, video_id, author, text, [reply_user, reply,] sentiment_tag, updated_at.
    pub fn insert(&self) -> String {
        match self.reply {
            Some((reply_user, reply)) => format!(
                "INSERT INTO {} ({}, {}, {}, {}, {}, {}, sentiment_tag, {}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                self.table,
                self.id,
                self.video_id,
                self.author,
                self.text,
                reply_user,
                reply,
                self.updated_at
            ),
            None => format!(
                "INSERT INTO {} ({}, {}, {}, {}, sentiment_tag, {}) VALUES (?, ?, ?, ?, ?, ?)",
                self.table, self.id, self.video_id, self.author, self.text, self.updated_at
            ),
        }
    }

    pub fn update_sentiment(&self) -> String {
        format!(
            "UPDATE {} SET sentiment_tag = ? WHERE {} = ?",
            self.table, self.id
        )
    }

    pub fn count(&self) -> String {
        format!("SELECT COUNT(*) FROM {}", self.table)
    }
}
