//! Scheduler (§4.5 C5): materializes Segments from Program x FormatClock x
//! BroadcastSchedule for every hour in the broadcast window. Grounded on
//! the teacher's `kernel/scheduled_tasks.rs` periodic-task shape, adapted
//! to a plain `tokio::time::interval` tick since the spec's horizon/tick
//! cadence is a fixed short period, not a calendar cron schedule.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Timelike, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domains::program::{BroadcastSchedule, FormatClock, FormatSlot, Program};
use crate::domains::segments::state_machine;
use crate::kernel::jobs::{EnqueueSpec, JobQueue, JobPriority};

pub struct Scheduler {
    pool: PgPool,
    queue: std::sync::Arc<dyn JobQueue>,
    horizon_hours: i64,
    default_lead_time_secs: i64,
}

/// `idempotency_key = SHA-256(program_id | hour_start_ts | slot_index)`,
/// the uniqueness anchor for scheduling materialization (§3, §4.5 rule 2).
pub fn segment_idempotency_key(program_id: Uuid, hour_start: DateTime<Utc>, slot_index: i32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(program_id.as_bytes());
    hasher.update(b"|");
    hasher.update(hour_start.timestamp().to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(slot_index.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

impl Scheduler {
    pub fn new(
        pool: PgPool,
        queue: std::sync::Arc<dyn JobQueue>,
        horizon_hours: i64,
        default_lead_time_secs: i64,
    ) -> Self {
        Self { pool, queue, horizon_hours, default_lead_time_secs }
    }

    pub async fn run(&self, tick_interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(tick_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(Utc::now()).await {
                        warn!(error = %e, "scheduler tick failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Run one scheduling pass over `[now, now + horizon]`, hour-aligned.
    #[tracing::instrument(skip(self))]
    pub async fn tick(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        let start_hour = now
            .date_naive()
            .and_hms_opt(now.hour(), 0, 0)
            .unwrap()
            .and_utc();

        let hours = (self.horizon_hours).max(1);
        for i in 0..hours {
            let hour_start = start_hour + ChronoDuration::hours(i);
            if let Err(e) = self.materialize_hour(hour_start).await {
                warn!(hour = %hour_start, error = %e, "failed to materialize hour");
            }
        }
        Ok(())
    }

    async fn materialize_hour(&self, hour_start: DateTime<Utc>) -> anyhow::Result<()> {
        let day_of_week = hour_start.weekday().num_days_from_sunday() as i16;
        let hour_time = NaiveTime::from_hms_opt(hour_start.hour(), 0, 0).unwrap();

        let schedules: Vec<BroadcastSchedule> =
            sqlx::query_as("SELECT * FROM broadcast_schedule WHERE active = true")
                .fetch_all(&self.pool)
                .await?;

        let mut candidates: Vec<&BroadcastSchedule> = schedules
            .iter()
            .filter(|s| s.covers_day(day_of_week) && s.covers_hour(hour_time))
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        // Highest priority wins; ties broken by earlier creation, then by
        // program_id for full determinism (§4.5 rules 1 and 6).
        candidates.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.program_id.cmp(&b.program_id))
        });

        let winner = candidates[0];
        for shadowed in &candidates[1..] {
            info!(
                program_id = %shadowed.program_id,
                winner_program_id = %winner.program_id,
                hour = %hour_start,
                "broadcast schedule entry shadowed by higher/earlier-priority overlap"
            );
        }

        self.materialize_program(winner.program_id, hour_start).await
    }

    async fn materialize_program(&self, program_id: Uuid, hour_start: DateTime<Utc>) -> anyhow::Result<()> {
        let program: Program = sqlx::query_as("SELECT * FROM programs WHERE id = $1 AND active = true")
            .bind(program_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("program {program_id} not found or inactive"))?;

        program.validate().map_err(|e| anyhow::anyhow!(e))?;

        let slots: Vec<FormatSlot> = sqlx::query_as(
            "SELECT * FROM format_slots WHERE format_clock_id = $1 ORDER BY order_index",
        )
        .bind(program.format_clock_id)
        .fetch_all(&self.pool)
        .await?;

        if let Err(e) = FormatClock::validate_slots(&slots) {
            // Misconfigured clocks are fatal at scheduling time, logged
            // and skipped rather than scheduled with wrong durations.
            warn!(program_id = %program_id, error = %e, "format clock misconfigured, skipping");
            return Ok(());
        }

        let lang: Option<(String,)> = sqlx::query_as("SELECT language FROM djs WHERE id = $1")
            .bind(program.primary_dj())
            .fetch_optional(&self.pool)
            .await?;
        let lang = lang.map(|(l,)| l).unwrap_or_else(|| "en".to_string());

        let mut offset_secs = 0i64;
        for slot in &slots {
            let scheduled_start_ts = hour_start + ChronoDuration::seconds(offset_secs);
            let idempotency_key = segment_idempotency_key(program_id, hour_start, slot.order_index);

            let inserted: Option<(Uuid,)> = sqlx::query_as(
                r#"
                INSERT INTO segments (
                    id, program_id, slot_type, state, lang, scheduled_start_ts,
                    retry_count, max_retries, citations, idempotency_key, updated_at, created_at
                )
                VALUES ($1, $2, $3, 'queued', $4, $5, 0, 3, '[]'::jsonb, $6, NOW(), NOW())
                ON CONFLICT (idempotency_key) DO NOTHING
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(program_id)
            .bind(&slot.slot_type)
            .bind(&lang)
            .bind(scheduled_start_ts)
            .bind(&idempotency_key)
            .fetch_optional(&self.pool)
            .await?;

            if let Some((segment_id,)) = inserted {
                let lead_time = ChronoDuration::seconds(self.default_lead_time_secs);
                let run_at = scheduled_start_ts - lead_time;
                self.queue
                    .enqueue(
                        EnqueueSpec::builder()
                            .job_type("segment_make".to_string())
                            .payload(serde_json::json!({ "segment_id": segment_id }))
                            .idempotency_key(format!("segment_make:{segment_id}"))
                            .priority(JobPriority::Normal)
                            .run_at(run_at)
                            .build(),
                    )
                    .await?;
            }

            offset_secs += slot.duration_sec as i64;
        }
        Ok(())
    }

    /// Deactivating a schedule entry cancels not-yet-rendering segments it
    /// produced (§4.5 Cancellation).
    pub async fn cancel_program_segments(&self, program_id: Uuid) -> anyhow::Result<u64> {
        let cancelled: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM segments WHERE program_id = $1 AND state IN ('queued', 'retrieving', 'generating')",
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;

        for (segment_id,) in &cancelled {
            let _ = state_machine::fail(&self.pool, *segment_id, "ScheduleCancelled").await;
        }
        Ok(cancelled.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_key_is_deterministic() {
        let program_id = Uuid::new_v4();
        let hour = Utc::now();
        assert_eq!(
            segment_idempotency_key(program_id, hour, 2),
            segment_idempotency_key(program_id, hour, 2)
        );
    }

    #[test]
    fn idempotency_key_differs_by_slot_index() {
        let program_id = Uuid::new_v4();
        let hour = Utc::now();
        assert_ne!(
            segment_idempotency_key(program_id, hour, 0),
            segment_idempotency_key(program_id, hour, 1)
        );
    }
}
