//! Segment and Citation models (§3). Grounded on the teacher's
//! `domains::schedules::models::schedule` (`sqlx::FromRow` + JSON columns
//! for nested structures).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, Serialize, Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SegmentState {
    Queued,
    Retrieving,
    Generating,
    Rendering,
    Normalizing,
    Ready,
    Airing,
    Aired,
    Archived,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub source_id: Uuid,
    pub chunk_id: Uuid,
    pub title: String,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub program_id: Uuid,
    pub slot_type: String,
    pub state: SegmentState,
    pub lang: String,
    pub script_md: Option<String>,
    pub asset_id: Option<Uuid>,
    pub duration_sec: Option<i32>,
    pub scheduled_start_ts: DateTime<Utc>,
    pub aired_at: Option<DateTime<Utc>>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    /// Stored as JSON; `citations` are immutable once generated (§3).
    pub citations: Value,
    pub cache_key: Option<String>,
    pub parent_segment_id: Option<Uuid>,
    pub generation_metrics: Option<Value>,
    pub idempotency_key: String,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Segment {
    pub fn citations(&self) -> Vec<Citation> {
        serde_json::from_value(self.citations.clone()).unwrap_or_default()
    }
}
