use serde::{Deserialize, Serialize};
use validator::Validate;

/// Platform a comment was collected from.
/// Each source has its own set of lifecycle tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    #[serde(rename = "default", alias = "native")]
    Native,
    Youtube,
}

impl Source {
    pub const ALL: [Source; 2] = [Source::Native, Source::Youtube];

    pub fn as_str(self) -> &'static str {
        match self {
            Source::Native => "native",
            Source::Youtube => "youtube",
        }
    }
}

/// The lifecycle table a comment currently lives in.
///
/// Dashboard URLs name these `main`, `good` and `bad`; both spellings are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleTable {
    #[serde(alias = "main")]
    Pending,
    #[serde(alias = "good")]
    Approved,
    #[serde(alias = "bad")]
    Rejected,
}

impl LifecycleTable {
    pub const ALL: [LifecycleTable; 3] = [
        LifecycleTable::Pending,
        LifecycleTable::Approved,
        LifecycleTable::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleTable::Pending => "pending",
            LifecycleTable::Approved => "approved",
            LifecycleTable::Rejected => "rejected",
        }
    }
}

/// Sentiment label written by the enrichment pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentTag {
    #[default]
    Unset,
    Good,
    Bad,
}

impl SentimentTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SentimentTag::Unset => "unset",
            SentimentTag::Good => "good",
            SentimentTag::Bad => "bad",
        }
    }

    /// Maps a stored column value. Unknown values read as `Unset`.
    pub fn from_db(value: &str) -> Self {
        match value {
            "good" => SentimentTag::Good,
            "bad" => SentimentTag::Bad,
            _ => SentimentTag::Unset,
        }
    }

    /// Maps a classifier label: `negative` is bad, everything else is good.
    pub fn from_prediction(label: &str) -> Self {
        if label.trim().eq_ignore_ascii_case("negative") {
            SentimentTag::Bad
        } else {
            SentimentTag::Good
        }
    }
}

/// Canonical comment shape shared by both sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub video_id: i64,
    pub main_comment_user: String,
    pub main_comment: String,
    pub reply_user: Option<String>,
    pub reply: Option<String>,
    pub sentiment_tag: SentimentTag,
    /// Stored timestamp text, carried through moves byte for byte.
    pub updated_at: String,
    pub source: Source,
}

/// `?source=` query parameter. Missing means the native source.
#[derive(Debug, Default, Deserialize)]
pub struct SourceQuery {
    #[serde(default)]
    pub source: Source,
}

/// Body of every bulk endpoint.
#[derive(Debug, Deserialize, Validate)]
pub struct BulkIdsRequest {
    #[validate(length(min = 1, max = 5000, message = "ids must contain between 1 and 5000 entries"))]
    pub ids: Vec<i64>,
}

/// A reply attached to a comment, as shown in the details view.
#[derive(Debug, Clone, Serialize)]
pub struct ReplyView {
    pub reply_user: String,
    pub reply: String,
}

/// Response of `GET /api/comments/{video_id}/details`.
#[derive(Debug, Serialize)]
pub struct CommentDetails {
    pub video_id: i64,
    pub main_comment: String,
    pub main_comment_user: String,
    pub preview: String,
    pub replies: Vec<ReplyView>,
}

const PREVIEW_CHARS: usize = 100;

/// Shortens a comment for list previews, cutting on a char boundary.
pub fn preview_of(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head.trim_end())
    } else {
        head
    }
}

impl CommentDetails {
    /// Builds the details view from all comments of one video, oldest first.
    /// Returns `None` when the video has no comments.
    pub fn from_comments(video_id: i64, comments: &[Comment]) -> Option<Self> {
        let first = comments.first()?;

        let replies = comments
            .iter()
            .filter_map(|c| match (&c.reply_user, &c.reply) {
                (Some(user), Some(reply)) => Some(ReplyView {
                    reply_user: user.clone(),
                    reply: reply.clone(),
                }),
                _ => None,
            })
            .collect();

        Some(Self {
            video_id,
            main_comment: first.main_comment.clone(),
            main_comment_user: first.main_comment_user.clone(),
            preview: preview_of(&first.main_comment),
            replies,
        })
    }
}
