//! Source content and indexing state (§3 Data Model). Grounded in shape on
//! the teacher's `domains::schedules::models::schedule` (`sqlx::FromRow`
//! structs alongside `TypedBuilder` construction params).

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum SourceType {
    UniverseDoc,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum DocStatus {
    Draft,
    Published,
    Archived,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct UniverseDoc {
    pub id: Uuid,
    pub status: DocStatus,
    pub language: String,
    pub tags: Vec<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_date: DateTime<Utc>,
    pub importance: i16,
    pub language: String,
    pub tags: Vec<String>,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub source_id: Uuid,
    pub source_type: SourceType,
    pub chunk_text: String,
    pub chunk_index: i32,
    pub token_count: i32,
    pub content_hash: String,
    pub lang: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Embedding {
    pub id: Uuid,
    pub chunk_id: Uuid,
    pub vector: pgvector::Vector,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum IndexState {
    Pending,
    Processing,
    Complete,
    Failed,
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize)]
pub struct IndexStatus {
    pub source_id: Uuid,
    pub source_type: SourceType,
    pub state: IndexState,
    pub chunks_created: i32,
    pub embeddings_created: i32,
    pub last_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}
