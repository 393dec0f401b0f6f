//! The durable job queue surface (§4.1). Grounded on the teacher's
//! `kernel/jobs/queue.rs`: a small `JobQueue` trait in front of a
//! Postgres-backed implementation, with idempotency-key lookups guarding
//! `enqueue` against duplicate submission.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{ErrorKind, Job, JobPriority, JobStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    Created(Uuid),
    Duplicate(Uuid),
}

/// Per-call enqueue parameters. Mirrors the teacher's `CommandMeta`-derived
/// builder used at every `enqueue` call site.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct EnqueueSpec {
    pub job_type: String,
    pub payload: Value,
    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,
    #[builder(default = JobPriority::Normal)]
    pub priority: JobPriority,
    #[builder(default, setter(strip_option))]
    pub run_at: Option<chrono::DateTime<chrono::Utc>>,
    #[builder(default = 3)]
    pub max_retries: i32,
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, spec: EnqueueSpec) -> anyhow::Result<EnqueueResult>;
    async fn claim(&self, worker_id: &str, job_types: &[String], batch_size: i64) -> anyhow::Result<Vec<Job>>;
    async fn heartbeat(&self, id: Uuid, worker_id: &str) -> anyhow::Result<()>;
    async fn mark_succeeded(&self, id: Uuid) -> anyhow::Result<()>;
    async fn mark_failed(&self, id: Uuid, error: &str, kind: ErrorKind) -> anyhow::Result<JobStatus>;
    async fn cancel(&self, id: Uuid) -> anyhow::Result<()>;
}

pub struct PostgresJobQueue {
    pool: PgPool,
    lease_seconds: i64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool, lease_seconds: i64) -> Self {
        Self { pool, lease_seconds }
    }
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    async fn enqueue(&self, spec: EnqueueSpec) -> anyhow::Result<EnqueueResult> {
        if let Some(key) = &spec.idempotency_key {
            if let Some(existing) = Job::find_by_idempotency_key(&self.pool, &spec.job_type, key).await? {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let mut builder = Job::builder()
            .job_type(spec.job_type)
            .payload(spec.payload)
            .priority(spec.priority)
            .max_retries(spec.max_retries);
        if let Some(key) = spec.idempotency_key {
            builder = builder.idempotency_key(key);
        }
        if let Some(run_at) = spec.run_at {
            builder = builder.next_run_at(run_at);
        }
        let job = builder.build();

        let inserted = job.insert(&self.pool).await?;
        Ok(EnqueueResult::Created(inserted.id))
    }

    async fn claim(&self, worker_id: &str, job_types: &[String], batch_size: i64) -> anyhow::Result<Vec<Job>> {
        Ok(Job::claim_jobs(&self.pool, worker_id, job_types, batch_size, self.lease_seconds).await?)
    }

    async fn heartbeat(&self, id: Uuid, worker_id: &str) -> anyhow::Result<()> {
        Job::extend_lease(&self.pool, id, worker_id, self.lease_seconds).await?;
        Ok(())
    }

    async fn mark_succeeded(&self, id: Uuid) -> anyhow::Result<()> {
        Job::mark_succeeded(&self.pool, id).await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str, kind: ErrorKind) -> anyhow::Result<JobStatus> {
        Ok(Job::mark_failed(&self.pool, id, error, kind).await?)
    }

    async fn cancel(&self, id: Uuid) -> anyhow::Result<()> {
        Job::cancel(&self.pool, id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_result_helpers() {
        let id = Uuid::new_v4();
        assert_eq!(EnqueueResult::Created(id), EnqueueResult::Created(id));
        assert_ne!(EnqueueResult::Created(id), EnqueueResult::Duplicate(id));
    }
}
