//! Segment Generation Worker (§4.7 C7): orchestrates retrieve -> generate
//! script -> enqueue render. Grounded on the teacher's
//! `kernel/jobs/worker.rs` job-processing shape, composed here with the
//! retrieval engine, LLM adapter, and segment state machine.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::prompt::{build_script_prompt, retrieval_query_text};
use crate::domains::program::{Dj, Program};
use crate::domains::retrieval::{HybridRetrievalEngine, RagFilters, RagQuery};
use crate::domains::segments::{state_machine, Segment, SegmentState};
use crate::kernel::jobs::{EnqueueSpec, ErrorKind, Job, JobHandler, JobPriority, JobQueue};
use crate::kernel::llm_client::BaseLlmService;
use crate::kernel::time_service::TimeService;

const MIN_SCRIPT_LEN: usize = 50;
const MAX_SCRIPT_LEN: usize = 5000;
const MAX_CORRECTIVE_ATTEMPTS: usize = 2;

#[derive(Debug, Deserialize)]
pub struct SegmentMakePayload {
    pub segment_id: Uuid,
}

pub struct SegmentGenerationWorker {
    pool: PgPool,
    retrieval: Arc<HybridRetrievalEngine>,
    llm: Arc<dyn BaseLlmService>,
    time: Arc<TimeService>,
    queue: Arc<dyn JobQueue>,
    model_name: String,
}

impl SegmentGenerationWorker {
    pub fn new(
        pool: PgPool,
        retrieval: Arc<HybridRetrievalEngine>,
        llm: Arc<dyn BaseLlmService>,
        time: Arc<TimeService>,
        queue: Arc<dyn JobQueue>,
        model_name: String,
    ) -> Self {
        Self { pool, retrieval, llm, time, queue, model_name }
    }

    async fn run_segment(&self, segment_id: Uuid) -> Result<(), (String, ErrorKind)> {
        let segment = Segment::find(&self.pool, segment_id)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?
            .ok_or_else(|| (format!("segment {segment_id} not found"), ErrorKind::Validation))?;

        let program: Program = sqlx::query_as("SELECT * FROM programs WHERE id = $1")
            .bind(segment.program_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Validation))?;

        let djs: Vec<Dj> = sqlx::query_as("SELECT * FROM djs WHERE id = ANY($1)")
            .bind(&program.dj_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        state_machine::transition(&self.pool, segment_id, SegmentState::Queued, SegmentState::Retrieving, "segment_generation_worker")
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Consistency))?;

        let future_reference = self.time.now_future();
        let query_text = retrieval_query_text(&segment.slot_type, &program.description, future_reference);

        let query = RagQuery {
            text: query_text,
            lang: Some(segment.lang.clone()),
            filters: RagFilters::default(),
            top_k: 12,
            recency_boost: true,
            reference_time: Some(future_reference),
            allow_degraded: true,
        };

        let retrieved = self
            .retrieval
            .query(&query)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        let citations: Vec<_> = retrieved
            .chunks
            .iter()
            .map(|c| {
                json!({
                    "source_id": c.source_id,
                    "chunk_id": c.chunk_id,
                    "title": c.chunk_text.chars().take(60).collect::<String>(),
                    "relevance_score": c.final_score,
                })
            })
            .collect();

        sqlx::query("UPDATE segments SET citations = $2, updated_at = NOW() WHERE id = $1")
            .bind(segment_id)
            .bind(serde_json::Value::Array(citations))
            .execute(&self.pool)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        state_machine::transition(&self.pool, segment_id, SegmentState::Retrieving, SegmentState::Generating, "segment_generation_worker")
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Consistency))?;

        let start = std::time::Instant::now();
        let mut corrective = None;
        let mut script = String::new();
        let mut attempts = 0usize;

        loop {
            let prompt = build_script_prompt(&program, &djs, &segment.slot_type, &retrieved.chunks, corrective.clone());
            script = self
                .llm
                .generate_script(&prompt)
                .await
                .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

            if (MIN_SCRIPT_LEN..=MAX_SCRIPT_LEN).contains(&script.chars().count()) {
                break;
            }

            attempts += 1;
            if attempts > MAX_CORRECTIVE_ATTEMPTS {
                state_machine::fail(&self.pool, segment_id, "ScriptOutOfBounds")
                    .await
                    .map_err(|e| (e.to_string(), ErrorKind::Validation))?;
                return Err(("script length out of bounds after retries".to_string(), ErrorKind::Validation));
            }
            corrective = Some(format!(
                "The previous script was {} characters; rewrite it to be between {MIN_SCRIPT_LEN} and {MAX_SCRIPT_LEN} characters.",
                script.chars().count()
            ));
        }

        let metrics = json!({
            "latency_ms": start.elapsed().as_millis(),
            "token_count_estimate": crate::common::tokens::estimate_tokens(&script),
            "model": self.model_name,
            "retrieval_degraded": retrieved.degraded.unwrap_or(false),
        });

        sqlx::query("UPDATE segments SET script_md = $2, generation_metrics = $3, updated_at = NOW() WHERE id = $1")
            .bind(segment_id)
            .bind(&script)
            .bind(metrics)
            .execute(&self.pool)
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        self.queue
            .enqueue(
                EnqueueSpec::builder()
                    .job_type("segment_render".to_string())
                    .payload(json!({ "segment_id": segment_id }))
                    .idempotency_key(format!("segment_render:{segment_id}"))
                    .priority(JobPriority::Normal)
                    .build(),
            )
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Transient))?;

        state_machine::transition(&self.pool, segment_id, SegmentState::Generating, SegmentState::Rendering, "segment_generation_worker")
            .await
            .map_err(|e| (e.to_string(), ErrorKind::Consistency))?;

        Ok(())
    }
}

#[async_trait]
impl JobHandler for SegmentGenerationWorker {
    async fn handle(&self, job: &Job) -> Result<(), (String, ErrorKind)> {
        let payload: SegmentMakePayload = serde_json::from_value(job.payload.clone())
            .map_err(|e| (e.to_string(), ErrorKind::Validation))?;
        self.run_segment(payload.segment_id).await
    }
}
