//! Worker entry point: runs the Embedder Worker and Segment Generation
//! Worker under the shared `JobWorker` runtime (§4.9 C9). Grounded on the
//! teacher's `bin/server.rs` init pattern plus `kernel/jobs/worker.rs`'s
//! `JobWorker::run`.

use aeon_core::config::Config;
use aeon_core::domains::generation::SegmentGenerationWorker;
use aeon_core::domains::knowledge::EmbedderWorker;
use aeon_core::domains::retrieval::HybridRetrievalEngine;
use aeon_core::kernel::jobs::{JobWorker, JobWorkerConfig};
use aeon_core::kernel::ServerKernel;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
        .init();

    let config = Config::from_env()?;
    let kernel = ServerKernel::build(config.clone()).await?;

    let worker_id = format!("worker-{}", Uuid::new_v4());
    tracing::info!(worker_id, "starting aeon-worker");

    let worker_config = JobWorkerConfig {
        worker_id,
        batch_size: config.worker_concurrency as i64,
        max_poll_interval: Duration::from_secs(30),
        min_poll_interval: Duration::from_millis(100),
        heartbeat_interval: config.heartbeat_interval(),
        poison_pill_threshold: config.poison_pill_threshold,
        poison_pill_cooldown: Duration::from_secs(config.poison_pill_cooldown_secs),
        shutdown_drain: Duration::from_secs(config.shutdown_drain_secs),
    };

    let mut worker = JobWorker::new(kernel.queue.clone(), worker_config);

    let embedder = Arc::new(EmbedderWorker::new(
        kernel.pool.clone(),
        kernel.embeddings.clone(),
        "aeon-embed-v1".to_string(),
    ));
    worker.register("kb_index", embedder);

    let retrieval = Arc::new(HybridRetrievalEngine::new(kernel.pool.clone(), kernel.embeddings.clone()));
    let generation = Arc::new(SegmentGenerationWorker::new(
        kernel.pool.clone(),
        retrieval,
        kernel.llm.clone(),
        kernel.time.clone(),
        kernel.queue.clone(),
        "aeon-script-v1".to_string(),
    ));
    worker.register("segment_make", generation);

    let host = aeon_core::kernel::ServiceHost::new();
    host.install_signal_handler();
    worker.run(host.shutdown_token()).await;
    Ok(())
}
