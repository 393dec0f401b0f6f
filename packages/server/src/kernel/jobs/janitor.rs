//! Periodic sweep that reclaims jobs whose lease expired without a
//! heartbeat (worker crash, network partition). `claim_jobs` already treats
//! `status = 'running' AND lease_expires_at < NOW()` as claimable, so the
//! janitor's only remaining job is to push those back to `pending` for
//! workers that poll rather than claim directly, and to prune old
//! terminal rows. Grounded on the teacher's periodic-task pattern in
//! `kernel/scheduled_tasks.rs`, adapted to a plain `tokio::time::interval`
//! since our period is a fixed short duration, not a cron schedule.

use sqlx::PgPool;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct Janitor {
    pool: PgPool,
    interval: Duration,
}

impl Janitor {
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self { pool, interval }
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!(error = %e, "janitor sweep failed");
                    }
                }
                _ = shutdown.cancelled() => {
                    info!("janitor shutting down");
                    break;
                }
            }
        }
    }

    async fn sweep(&self) -> sqlx::Result<()> {
        let reclaimed = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                locked_by = NULL,
                lease_expires_at = NULL,
                last_error = 'LeaseExpired',
                last_error_kind = 'transient',
                updated_at = NOW()
            WHERE status = 'running' AND lease_expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        if reclaimed > 0 {
            info!(count = reclaimed, "janitor reclaimed expired leases");
        }
        Ok(())
    }
}
