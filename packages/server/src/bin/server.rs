//! HTTP entry point: serves the retrieval/health/time API and runs the
//! Scheduler and janitor sweep in-process. Grounded on the teacher's
//! `bin/server.rs` tracing/env setup.

use aeon_core::config::Config;
use aeon_core::domains::scheduler::Scheduler;
use aeon_core::kernel::jobs::janitor::Janitor;
use aeon_core::kernel::{ServerKernel, ServiceHost};
use aeon_core::server::{routes, AppState};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true).with_line_number(true))
        .init();

    let config = Config::from_env()?;
    tracing::info!(http_port = config.http_port, "starting aeon-server");

    let kernel = ServerKernel::build(config.clone()).await?;

    sqlx::migrate!("./migrations").run(&kernel.pool).await?;

    let host = ServiceHost::new();
    host.install_signal_handler();
    let shutdown = host.shutdown_token();

    let janitor = Janitor::new(kernel.pool.clone(), Duration::from_secs(config.janitor_interval_secs));
    let janitor_shutdown = shutdown.clone();
    let janitor_handle = tokio::spawn(async move { janitor.run(janitor_shutdown).await });

    let time_for_skew = kernel.time.clone();
    let skew_shutdown = shutdown.clone();
    let skew_handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            tokio::select! {
                _ = ticker.tick() => time_for_skew.refresh_skew().await,
                _ = skew_shutdown.cancelled() => break,
            }
        }
    });

    let scheduler = Scheduler::new(
        kernel.pool.clone(),
        kernel.queue.clone(),
        config.schedule_horizon_hours,
        config.default_lead_time_secs,
    );
    let scheduler_shutdown = shutdown.clone();
    let tick_interval = Duration::from_secs(config.schedule_tick_secs);
    let scheduler_handle = tokio::spawn(async move { scheduler.run(tick_interval, scheduler_shutdown).await });

    let state = AppState::new(kernel.clone());
    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    let _ = tokio::join!(janitor_handle, scheduler_handle, skew_handle);
    Ok(())
}
