use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'video' table. Static reference data.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Video {
    pub id: i64,
    pub url: String,
}
