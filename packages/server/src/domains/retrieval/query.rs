//! RAGQuery/RAGChunk wire types for the retrieval HTTP endpoint (§4.4, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn default_top_k() -> usize {
    12
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RagFilters {
    #[serde(default)]
    pub source_types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RagQuery {
    pub text: String,
    pub lang: Option<String>,
    #[serde(default)]
    pub filters: RagFilters,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_true")]
    pub recency_boost: bool,
    pub reference_time: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub allow_degraded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagChunk {
    pub chunk_id: Uuid,
    pub source_id: Uuid,
    pub chunk_text: String,
    pub vector_score: f64,
    pub lexical_score: f64,
    pub recency_score: f64,
    pub final_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RagResponse {
    pub chunks: Vec<RagChunk>,
    pub query_time_ms: u64,
    pub total_results: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<bool>,
}
