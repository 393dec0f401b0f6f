//! Embedder Worker (§4.3 C3). Consumes `kb_index` jobs, runs the Chunker,
//! resolves each chunk's embedding through the content-hash cache, and
//! upserts the result transactionally. Grounded on the teacher's
//! `common::embedding::Embeddable` trait and `kernel/jobs/worker.rs`'s
//! `JobHandler`-shaped job processing.

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::chunker::chunk_text;
use super::models::{IndexState, SourceType};
use crate::kernel::embedding_client::BaseEmbeddingService;
use crate::kernel::jobs::{ErrorKind, Job, JobHandler};

#[derive(Debug, Deserialize)]
pub struct KbIndexPayload {
    pub source_id: Uuid,
    pub source_type: SourceType,
}

pub struct EmbedderWorker {
    pool: PgPool,
    embeddings: Arc<dyn BaseEmbeddingService>,
    model_name: String,
}

impl EmbedderWorker {
    pub fn new(pool: PgPool, embeddings: Arc<dyn BaseEmbeddingService>, model_name: String) -> Self {
        Self { pool, embeddings, model_name }
    }

    async fn load_source_text(&self, source_id: Uuid, source_type: SourceType) -> anyhow::Result<(String, String)> {
        match source_type {
            SourceType::UniverseDoc => {
                let row: (String, String) =
                    sqlx::query_as("SELECT body, language FROM universe_docs WHERE id = $1")
                        .bind(source_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(row)
            }
            SourceType::Event => {
                let row: (String, String) =
                    sqlx::query_as("SELECT body, language FROM events WHERE id = $1")
                        .bind(source_id)
                        .fetch_one(&self.pool)
                        .await?;
                Ok(row)
            }
        }
    }

    async fn run_index(&self, payload: &KbIndexPayload) -> Result<(), (String, ErrorKind)> {
        self.set_index_state(payload.source_id, payload.source_type, IndexState::Processing, None)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        let (body, lang) = self
            .load_source_text(payload.source_id, payload.source_type)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Validation))?;

        let outputs = chunk_text(&body);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        let existing: Vec<(Uuid, String)> = sqlx::query_as(
            "SELECT id, content_hash FROM kb_chunks WHERE source_id = $1",
        )
        .bind(payload.source_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        let new_hashes: std::collections::HashSet<&str> =
            outputs.iter().map(|o| o.content_hash.as_str()).collect();

        // Delete chunks (and cascading embeddings) no longer present.
        for (id, hash) in &existing {
            if !new_hashes.contains(hash.as_str()) {
                sqlx::query("DELETE FROM kb_chunks WHERE id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| (e.to_string(), ErrorKind::Transient))?;
            }
        }

        let existing_hashes: std::collections::HashSet<&str> =
            existing.iter().map(|(_, h)| h.as_str()).collect();

        for output in &outputs {
            if existing_hashes.contains(output.content_hash.as_str()) {
                continue;
            }

            let chunk_id = Uuid::new_v4();
            sqlx::query(
                r#"
                INSERT INTO kb_chunks (id, source_id, source_type, chunk_text, chunk_index, token_count, content_hash, lang, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
                ON CONFLICT (source_id, content_hash) DO NOTHING
                "#,
            )
            .bind(chunk_id)
            .bind(payload.source_id)
            .bind(payload.source_type)
            .bind(&output.chunk_text)
            .bind(output.chunk_index)
            .bind(output.token_count)
            .bind(&output.content_hash)
            .bind(&lang)
            .execute(&mut *tx)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

            // Embedding cache lookup by content_hash: another chunk
            // elsewhere with the same hash may already have a vector.
            let cached: Option<(pgvector::Vector,)> = sqlx::query_as(
                r#"
                SELECT e.vector FROM kb_embeddings e
                JOIN kb_chunks c ON c.id = e.chunk_id
                WHERE c.content_hash = $1
                LIMIT 1
                "#,
            )
            .bind(&output.content_hash)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

            let vector = match cached {
                Some((v,)) => v,
                None => {
                    let raw = self
                        .embeddings
                        .generate(&output.chunk_text)
                        .await
                        .map_err(|e| (e.to_string(), ErrorKind::Transient))?;
                    if raw.len() != 1024 {
                        return Err((
                            format!("embedding dimension {} != 1024", raw.len()),
                            ErrorKind::Validation,
                        ));
                    }
                    pgvector::Vector::from(raw)
                }
            };

            sqlx::query(
                r#"
                INSERT INTO kb_embeddings (id, chunk_id, vector, model_name, created_at)
                VALUES ($1, $2, $3, $4, NOW())
                ON CONFLICT (chunk_id) DO UPDATE SET vector = EXCLUDED.vector, model_name = EXCLUDED.model_name
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(chunk_id)
            .bind(vector)
            .bind(&self.model_name)
            .execute(&mut *tx)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;
        }

        tx.commit().await.map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        // Report the source's cumulative row counts, not this run's delta.
        // An unchanged reindex creates nothing, so it must leave the
        // counters as they were instead of resetting them (§8 S1).
        let chunks_created: i32 = sqlx::query_scalar("SELECT COUNT(*)::INT FROM kb_chunks WHERE source_id = $1")
            .bind(payload.source_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        let embeddings_created: i32 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)::INT FROM kb_embeddings e
            JOIN kb_chunks c ON c.id = e.chunk_id
            WHERE c.source_id = $1
            "#,
        )
        .bind(payload.source_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        sqlx::query(
            r#"
            UPDATE kb_index_status
            SET state = 'complete', chunks_created = $2, embeddings_created = $3, last_error = NULL, updated_at = NOW()
            WHERE source_id = $1
            "#,
        )
        .bind(payload.source_id)
        .bind(chunks_created)
        .bind(embeddings_created)
        .execute(&self.pool)
        .await
        .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        Ok(())
    }

    async fn set_index_state(
        &self,
        source_id: Uuid,
        source_type: SourceType,
        state: IndexState,
        error: Option<&str>,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kb_index_status (source_id, source_type, state, chunks_created, embeddings_created, last_error, updated_at)
            VALUES ($1, $2, $3, 0, 0, $4, NOW())
            ON CONFLICT (source_id) DO UPDATE SET state = EXCLUDED.state, last_error = EXCLUDED.last_error, updated_at = NOW()
            "#,
        )
        .bind(source_id)
        .bind(source_type)
        .bind(state)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl JobHandler for EmbedderWorker {
    async fn handle(&self, job: &Job) -> Result<(), (String, ErrorKind)> {
        let payload: KbIndexPayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| (e.to_string(), ErrorKind::Validation))?;

        let result = self.run_index(&payload).await;
        if let Err((message, _)) = &result {
            let _ = self
                .set_index_state(payload.source_id, payload.source_type, IndexState::Failed, Some(message))
                .await;
        }
        result
    }
}
