//! The `Job` row and its supporting enums (§4.1).
//!
//! Grounded on the teacher's `kernel/jobs/job.rs`: a `TypedBuilder`-derived
//! struct backed directly by a `jobs` table, `sqlx::Type` enums stored as
//! Postgres `TEXT` with `rename_all = "snake_case"`, and claim/lease/retry
//! logic expressed as plain SQL rather than an ORM abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use crate::common::sql::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLetter,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Urgent,
}

impl JobPriority {
    /// Lower numeric value sorts first in `ORDER BY priority` (§4.1).
    pub fn as_i16(&self) -> i16 {
        match self {
            JobPriority::Urgent => 0,
            JobPriority::High => 1,
            JobPriority::Normal => 2,
            JobPriority::Low => 3,
        }
    }
}

/// What kind of problem caused a job to fail. Drives whether `mark_failed`
/// retries or routes straight to the dead-letter queue (§4.1, §7 Validation
/// vs Transient).
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Validation,
    Consistency,
    Fatal,
}

impl ErrorKind {
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Transient)
    }
}

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize, serde::Deserialize, TypedBuilder)]
pub struct Job {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,

    pub job_type: String,

    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,

    pub payload: Value,

    #[builder(default = JobStatus::Pending)]
    pub status: JobStatus,

    #[builder(default = JobPriority::Normal)]
    pub priority: JobPriority,

    #[builder(default = 0)]
    pub retry_count: i32,

    #[builder(default = 3)]
    pub max_retries: i32,

    #[builder(default, setter(strip_option))]
    pub next_run_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub lease_expires_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub locked_by: Option<String>,

    #[builder(default, setter(strip_option))]
    pub last_error: Option<String>,

    #[builder(default, setter(strip_option))]
    pub last_error_kind: Option<ErrorKind>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,

    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Pending)
            && self.next_run_at.map(|t| t <= now).unwrap_or(true)
    }

    pub fn is_lease_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, JobStatus::Running)
            && self.lease_expires_at.map(|t| t < now).unwrap_or(false)
    }

    /// Exponential backoff with a cap, mirroring the teacher's
    /// `2i64.pow(retry_count).min(3600)` seconds-to-next-attempt formula.
    pub fn backoff_seconds(&self) -> i64 {
        2i64.saturating_pow(self.retry_count.max(0) as u32).min(3600)
    }

    /// Claim up to `batch_size` ready or lease-expired jobs atomically via
    /// `SELECT ... FOR UPDATE SKIP LOCKED`, the central invariant of §4.1.
    /// Ordering uses `JobPriority::as_i16` through a `CASE` expression
    /// rather than the `priority` column's raw text value, since `'high' <
    /// 'low' < 'normal' < 'urgent'` alphabetically is not the real priority
    /// order. An empty `job_types` means "claim any registered type".
    pub async fn claim_jobs(
        pool: &PgPool,
        worker_id: &str,
        job_types: &[String],
        batch_size: i64,
        lease_seconds: i64,
    ) -> sqlx::Result<Vec<Job>> {
        let job_types = (!job_types.is_empty()).then(|| job_types.to_vec());
        sqlx::query_as::<_, Job>(
            r#"
            WITH next_jobs AS (
                SELECT id FROM jobs
                WHERE (
                        (status = 'pending' AND (next_run_at IS NULL OR next_run_at <= NOW()))
                     OR (status = 'running' AND lease_expires_at < NOW())
                      )
                  AND ($4::text[] IS NULL OR job_type = ANY($4))
                ORDER BY
                    CASE priority
                        WHEN 'urgent' THEN 0
                        WHEN 'high' THEN 1
                        WHEN 'normal' THEN 2
                        WHEN 'low' THEN 3
                        ELSE 4
                    END,
                    COALESCE(next_run_at, created_at)
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'running',
                locked_by = $2,
                lease_expires_at = NOW() + make_interval(secs => $3),
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING *
            "#,
        )
        .bind(batch_size)
        .bind(worker_id)
        .bind(lease_seconds as f64)
        .bind(job_types)
        .fetch_all(pool)
        .await
    }

    /// Renews a lease this worker still holds. Fails with a `LeaseLost`
    /// error (rather than silently succeeding) when the row no longer
    /// matches `id + locked_by + status='running'`, meaning the janitor
    /// already reclaimed the lease and handed it to another worker (§4.1
    /// `Renew`).
    pub async fn extend_lease(
        pool: &PgPool,
        id: Uuid,
        worker_id: &str,
        lease_seconds: i64,
    ) -> anyhow::Result<()> {
        let rows_affected = sqlx::query(
            r#"
            UPDATE jobs
            SET lease_expires_at = NOW() + make_interval(secs => $3), updated_at = NOW()
            WHERE id = $1 AND locked_by = $2 AND status = 'running'
            "#,
        )
        .bind(id)
        .bind(worker_id)
        .bind(lease_seconds as f64)
        .execute(pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            anyhow::bail!("LeaseLost");
        }
        Ok(())
    }

    pub async fn mark_succeeded(pool: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query(
            "UPDATE jobs SET status = 'succeeded', updated_at = NOW(), lease_expires_at = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Either schedules a retry at `NOW() + backoff` or, once `max_retries`
    /// is exhausted (or `kind` is non-retryable), moves the job to the dead
    /// letter queue.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        kind: ErrorKind,
    ) -> sqlx::Result<JobStatus> {
        let job: Job = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await?;

        let exhausted = job.retry_count + 1 > job.max_retries;
        if !kind.should_retry() || exhausted {
            Self::mark_dead_letter(pool, id, error).await?;
            return Ok(JobStatus::DeadLetter);
        }

        let backoff = job.backoff_seconds();
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                retry_count = retry_count + 1,
                next_run_at = NOW() + make_interval(secs => $2),
                last_error = $3,
                last_error_kind = $4,
                lease_expires_at = NULL,
                locked_by = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(backoff as f64)
        .bind(error)
        .bind(kind)
        .execute(pool)
        .await?;
        Ok(JobStatus::Pending)
    }

    pub async fn mark_dead_letter(pool: &PgPool, id: Uuid, error: &str) -> sqlx::Result<()> {
        let mut tx = pool.begin().await?;
        sqlx::query(
            "UPDATE jobs SET status = 'dead_letter', last_error = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO dead_letter_queue (id, job_id, job_type, payload, last_error, failed_at)
            SELECT gen_random_uuid(), id, job_type, payload, $2, NOW()
            FROM jobs WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn cancel(pool: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("UPDATE jobs SET status = 'cancelled', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn find_by_idempotency_key(
        pool: &PgPool,
        job_type: &str,
        key: &str,
    ) -> sqlx::Result<Option<Job>> {
        sqlx::query_as("SELECT * FROM jobs WHERE job_type = $1 AND idempotency_key = $2")
            .bind(job_type)
            .bind(key)
            .fetch_optional(pool)
            .await
    }
}

#[async_trait]
impl Record for Job {
    async fn insert(&self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Job>(
            r#"
            INSERT INTO jobs (
                id, job_type, idempotency_key, payload, status, priority,
                retry_count, max_retries, next_run_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            ON CONFLICT (job_type, idempotency_key) WHERE idempotency_key IS NOT NULL
            DO UPDATE SET updated_at = jobs.updated_at
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.job_type)
        .bind(&self.idempotency_key)
        .bind(&self.payload)
        .bind(self.status)
        .bind(self.priority)
        .bind(self.retry_count)
        .bind(self.max_retries)
        .bind(self.next_run_at)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
    }

    async fn find_by_id(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<Self>> {
        sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    async fn update(&self, pool: &PgPool) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Job>(
            r#"
            UPDATE jobs SET
                status = $2, priority = $3, retry_count = $4, max_retries = $5,
                next_run_at = $6, lease_expires_at = $7, locked_by = $8,
                last_error = $9, last_error_kind = $10, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.status)
        .bind(self.priority)
        .bind(self.retry_count)
        .bind(self.max_retries)
        .bind(self.next_run_at)
        .bind(self.lease_expires_at)
        .bind(&self.locked_by)
        .bind(&self.last_error)
        .bind(self.last_error_kind)
        .fetch_one(pool)
        .await
    }

    async fn delete(pool: &PgPool, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_has_default_max_retries_of_3() {
        let job = Job::builder()
            .job_type("chunk_document".to_string())
            .payload(Value::Null)
            .build();
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn is_ready_true_for_pending_with_no_next_run_at() {
        let job = Job::builder()
            .job_type("embed_chunk".to_string())
            .payload(Value::Null)
            .build();
        assert!(job.is_ready(Utc::now()));
    }

    #[test]
    fn is_ready_false_when_next_run_at_in_future() {
        let job = Job::builder()
            .job_type("embed_chunk".to_string())
            .payload(Value::Null)
            .next_run_at(Utc::now() + chrono::Duration::hours(1))
            .build();
        assert!(!job.is_ready(Utc::now()));
    }

    #[test]
    fn retryable_error_should_retry() {
        assert!(ErrorKind::Transient.should_retry());
        assert!(!ErrorKind::Validation.should_retry());
        assert!(!ErrorKind::Fatal.should_retry());
    }

    #[test]
    fn priority_ordering_is_correct() {
        assert!(JobPriority::Urgent.as_i16() < JobPriority::High.as_i16());
        assert!(JobPriority::High.as_i16() < JobPriority::Normal.as_i16());
        assert!(JobPriority::Normal.as_i16() < JobPriority::Low.as_i16());
    }

    #[test]
    fn backoff_caps_at_one_hour() {
        let mut job = Job::builder()
            .job_type("x".to_string())
            .payload(Value::Null)
            .build();
        job.retry_count = 20;
        assert_eq!(job.backoff_seconds(), 3600);
    }

    #[test]
    fn backoff_doubles_per_retry() {
        let mut job = Job::builder()
            .job_type("x".to_string())
            .payload(Value::Null)
            .build();
        job.retry_count = 3;
        assert_eq!(job.backoff_seconds(), 8);
    }
}
