//! Hybrid Retrieval Engine (§4.4 C4). Grounded on the teacher's
//! `domains::matching::effects::vector_search` (pgvector `<=>`
//! cosine-distance query pattern) for the vector leg, and
//! `domains::posts::effects::utils::sync_utils::cosine_similarity` for the
//! in-process fallback used once a candidate set is loaded.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::query::{RagChunk, RagQuery, RagResponse};
use super::scoring::{bm25_scores, final_score, recency_score};
use crate::kernel::embedding_client::BaseEmbeddingService;

fn non_empty(tags: &[String]) -> Option<Vec<String>> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.to_vec())
    }
}

struct CandidateRow {
    chunk_id: Uuid,
    source_id: Uuid,
    chunk_text: String,
    vector_score: f64,
    importance: Option<i16>,
    event_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

pub struct HybridRetrievalEngine {
    pool: PgPool,
    embeddings: Arc<dyn BaseEmbeddingService>,
}

impl HybridRetrievalEngine {
    pub fn new(pool: PgPool, embeddings: Arc<dyn BaseEmbeddingService>) -> Self {
        Self { pool, embeddings }
    }

    #[tracing::instrument(skip(self, query))]
    pub async fn query(&self, query: &RagQuery) -> anyhow::Result<RagResponse> {
        let start = std::time::Instant::now();
        let reference_time = query.reference_time.unwrap_or_else(Utc::now);

        let embedding = self.embeddings.generate(&query.text).await;
        let degraded = embedding.is_err();

        if degraded && !query.allow_degraded {
            anyhow::bail!("embedding backend unavailable and allow_degraded=false");
        }

        let candidates = match &embedding {
            Ok(vector) => self.candidates_by_vector(query, vector).await?,
            Err(e) => {
                warn!(error = %e, "embedding backend unavailable, degrading to lexical-only");
                self.candidates_lexical_only(query).await?
            }
        };

        if candidates.is_empty() {
            return Ok(RagResponse {
                chunks: Vec::new(),
                query_time_ms: start.elapsed().as_millis() as u64,
                total_results: 0,
                degraded: degraded.then_some(true),
            });
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.chunk_text.as_str()).collect();
        let lexical = bm25_scores(&query.text, &texts);

        let mut scored: Vec<RagChunk> = candidates
            .iter()
            .zip(lexical.iter())
            .map(|(c, &lex)| {
                let recency = recency_score(reference_time, c.event_date);
                let score = final_score(c.vector_score, lex, recency, query.recency_boost);
                RagChunk {
                    chunk_id: c.chunk_id,
                    source_id: c.source_id,
                    chunk_text: c.chunk_text.clone(),
                    vector_score: c.vector_score,
                    lexical_score: lex,
                    recency_score: recency,
                    final_score: score,
                }
            })
            .collect();

        // Deterministic ordering: final_score desc, then source importance
        // desc, then newer created_at, then lexicographic chunk_id (§4.4).
        let importance_by_chunk: std::collections::HashMap<Uuid, i16> = candidates
            .iter()
            .map(|c| (c.chunk_id, c.importance.unwrap_or(0)))
            .collect();
        let created_at_by_chunk: std::collections::HashMap<Uuid, DateTime<Utc>> =
            candidates.iter().map(|c| (c.chunk_id, c.created_at)).collect();

        scored.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    importance_by_chunk[&b.chunk_id].cmp(&importance_by_chunk[&a.chunk_id])
                })
                .then_with(|| created_at_by_chunk[&b.chunk_id].cmp(&created_at_by_chunk[&a.chunk_id]))
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });

        scored.truncate(query.top_k);
        let total_results = scored.len();

        Ok(RagResponse {
            chunks: scored,
            query_time_ms: start.elapsed().as_millis() as u64,
            total_results,
            degraded: degraded.then_some(true),
        })
    }

    async fn candidates_by_vector(
        &self,
        query: &RagQuery,
        vector: &[f32],
    ) -> anyhow::Result<Vec<CandidateRow>> {
        let pg_vector = pgvector::Vector::from(vector.to_vec());
        let lang = query.lang.clone();
        let source_types = non_empty(&query.filters.source_types);
        let tags = non_empty(&query.filters.tags);

        let rows: Vec<(Uuid, Uuid, String, f64, Option<i16>, Option<DateTime<Utc>>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT
                c.id, c.source_id, c.chunk_text,
                1 - (e.vector <=> $1) AS similarity,
                ev.importance,
                ev.event_date,
                c.created_at
            FROM kb_chunks c
            JOIN kb_embeddings e ON e.chunk_id = c.id
            LEFT JOIN events ev ON ev.id = c.source_id AND c.source_type = 'event'
            LEFT JOIN universe_docs ud ON ud.id = c.source_id AND c.source_type = 'universe_doc'
            WHERE ($2::text IS NULL OR c.lang = $2)
              AND ($3::text[] IS NULL OR c.source_type = ANY($3))
              AND ($4::text[] IS NULL OR COALESCE(ev.tags, ud.tags) && $4)
            ORDER BY similarity DESC
            LIMIT 40
            "#,
        )
        .bind(pg_vector)
        .bind(lang)
        .bind(source_types)
        .bind(tags)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(chunk_id, source_id, chunk_text, vector_score, importance, event_date, created_at)| {
                CandidateRow { chunk_id, source_id, chunk_text, vector_score, importance, event_date, created_at }
            })
            .collect())
    }

    /// Degraded-mode candidate fetch: no embedding available, so this
    /// widens the lexical net over the raw chunk table, ordered only by
    /// recency as a reasonable default before scoring proper (§4.4, §8
    /// S6).
    async fn candidates_lexical_only(&self, query: &RagQuery) -> anyhow::Result<Vec<CandidateRow>> {
        let lang = query.lang.clone();
        let source_types = non_empty(&query.filters.source_types);
        let tags = non_empty(&query.filters.tags);
        let rows: Vec<(Uuid, Uuid, String, Option<i16>, Option<DateTime<Utc>>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT c.id, c.source_id, c.chunk_text, ev.importance, ev.event_date, c.created_at
            FROM kb_chunks c
            LEFT JOIN events ev ON ev.id = c.source_id AND c.source_type = 'event'
            LEFT JOIN universe_docs ud ON ud.id = c.source_id AND c.source_type = 'universe_doc'
            WHERE ($1::text IS NULL OR c.lang = $1)
              AND ($2::text[] IS NULL OR c.source_type = ANY($2))
              AND ($3::text[] IS NULL OR COALESCE(ev.tags, ud.tags) && $3)
            ORDER BY c.created_at DESC
            LIMIT 40
            "#,
        )
        .bind(lang)
        .bind(source_types)
        .bind(tags)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(chunk_id, source_id, chunk_text, importance, event_date, created_at)| CandidateRow {
                chunk_id,
                source_id,
                chunk_text,
                vector_score: 0.0,
                importance,
                event_date,
                created_at,
            })
            .collect())
    }
}
