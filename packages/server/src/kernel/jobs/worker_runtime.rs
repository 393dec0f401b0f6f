//! Worker runtime (§4.9 C9): claims batches, runs each job under its own
//! heartbeat task, tracks consecutive failures per job type for the
//! poison-pill cooldown, and drains in-flight work on shutdown.
//!
//! Grounded on the teacher's `kernel/jobs/worker.rs`: `JobWorkerConfig`,
//! `running_jobs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>`, a
//! spawned heartbeat tick alongside the job future, and a bounded drain
//! wait during shutdown.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::job::{ErrorKind, Job};
use super::queue::JobQueue;

#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    pub worker_id: String,
    pub batch_size: i64,
    pub max_poll_interval: Duration,
    pub min_poll_interval: Duration,
    pub heartbeat_interval: Duration,
    pub poison_pill_threshold: u32,
    pub poison_pill_cooldown: Duration,
    pub shutdown_drain: Duration,
}

/// A unit of work a job payload deserializes into and executes against.
/// Handlers classify their own failures: `Err((message, kind))` decides
/// whether `mark_failed` retries or dead-letters (§7).
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), (String, ErrorKind)>;
}

pub struct JobWorker<Q: JobQueue> {
    queue: Arc<Q>,
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    config: JobWorkerConfig,
    running_jobs: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    failure_streaks: Arc<RwLock<HashMap<String, u32>>>,
    cooldowns: Arc<RwLock<HashMap<String, Instant>>>,
}

impl<Q: JobQueue + 'static> JobWorker<Q> {
    pub fn new(queue: Arc<Q>, config: JobWorkerConfig) -> Self {
        Self {
            queue,
            handlers: HashMap::new(),
            config,
            running_jobs: Arc::new(RwLock::new(HashMap::new())),
            failure_streaks: Arc::new(RwLock::new(HashMap::new())),
            cooldowns: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = self.config.min_poll_interval;
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let job_types_on_cooldown = self.job_types_on_cooldown().await;
            let registered_types: Vec<String> = self.handlers.keys().cloned().collect();
            let claimed = match self
                .queue
                .claim(&self.config.worker_id, &registered_types, self.config.batch_size)
                .await
            {
                Ok(jobs) => jobs
                    .into_iter()
                    .filter(|j| !job_types_on_cooldown.contains(&j.job_type))
                    .collect::<Vec<_>>(),
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    Vec::new()
                }
            };

            if claimed.is_empty() {
                interval = (interval * 2).min(self.config.max_poll_interval);
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = shutdown.cancelled() => break,
                }
                continue;
            }
            interval = self.config.min_poll_interval;

            let futures = claimed.into_iter().map(|job| self.process_job(job));
            join_all(futures).await;
        }

        self.drain().await;
    }

    async fn job_types_on_cooldown(&self) -> Vec<String> {
        let cooldowns = self.cooldowns.read().await;
        let now = Instant::now();
        cooldowns
            .iter()
            .filter(|(_, until)| **until > now)
            .map(|(k, _)| k.clone())
            .collect()
    }

    async fn process_job(&self, job: Job) {
        let Some(handler) = self.handlers.get(&job.job_type).cloned() else {
            warn!(job_type = %job.job_type, "no handler registered, leaving job pending");
            return;
        };

        let token = CancellationToken::new();
        self.running_jobs.write().await.insert(job.id, token.clone());

        let result = self.execute_with_heartbeat(&job, handler, token.clone()).await;
        self.running_jobs.write().await.remove(&job.id);

        match result {
            Ok(()) => {
                if let Err(e) = self.queue.mark_succeeded(job.id).await {
                    error!(error = %e, job_id = %job.id, "failed to mark job succeeded");
                }
                self.failure_streaks.write().await.remove(&job.job_type);
            }
            Err((message, kind)) => {
                if let Err(e) = self.queue.mark_failed(job.id, &message, kind).await {
                    error!(error = %e, job_id = %job.id, "failed to mark job failed");
                }
                self.record_failure(&job.job_type).await;
            }
        }
    }

    async fn record_failure(&self, job_type: &str) {
        let mut streaks = self.failure_streaks.write().await;
        let streak = streaks.entry(job_type.to_string()).or_insert(0);
        *streak += 1;
        if *streak >= self.config.poison_pill_threshold {
            warn!(job_type, streak = *streak, "poison pill threshold hit, cooling down");
            self.cooldowns
                .write()
                .await
                .insert(job_type.to_string(), Instant::now() + self.config.poison_pill_cooldown);
            *streak = 0;
        }
    }

    async fn execute_with_heartbeat(
        &self,
        job: &Job,
        handler: Arc<dyn JobHandler>,
        cancel: CancellationToken,
    ) -> Result<(), (String, ErrorKind)> {
        let queue = self.queue.clone();
        let worker_id = self.config.worker_id.clone();
        let job_id = job.id;
        let heartbeat_interval = self.config.heartbeat_interval;
        let heartbeat_cancel = cancel.clone();

        let heartbeat_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(heartbeat_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = queue.heartbeat(job_id, &worker_id).await {
                            error!(error = %e, job_id = %job_id, "heartbeat failed");
                        }
                    }
                    _ = heartbeat_cancel.cancelled() => break,
                }
            }
        });

        let outcome = handler.handle(job).await;
        cancel.cancel();
        let _ = heartbeat_task.await;
        outcome
    }

    async fn drain(&self) {
        let deadline = tokio::time::sleep(self.config.shutdown_drain);
        tokio::pin!(deadline);
        loop {
            if self.running_jobs.read().await.is_empty() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
                _ = &mut deadline => {
                    let remaining = self.running_jobs.read().await;
                    for token in remaining.values() {
                        token.cancel();
                    }
                    warn!(count = remaining.len(), "drain window expired, cancelling in-flight jobs");
                    break;
                }
            }
        }
        info!("worker drained");
    }
}
