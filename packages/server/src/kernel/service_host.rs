//! Generic service runtime shell: wires a `CancellationToken` to SIGTERM /
//! ctrl-c and drives any number of `Service` implementations to
//! completion, waiting for their graceful shutdown. Mirrors the teacher's
//! `Service` trait used to run `JobWorker` from `bin/server.rs`.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[async_trait]
pub trait Service: Send + Sync {
    /// Run until `shutdown` is cancelled, then return after draining.
    async fn run(&self, shutdown: CancellationToken);
}

pub struct ServiceHost {
    shutdown: CancellationToken,
}

impl ServiceHost {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Spawn a background task that cancels the shutdown token on ctrl-c or
    /// SIGTERM.
    pub fn install_signal_handler(&self) {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm =
                    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                        .expect("failed to install SIGTERM handler");
                tokio::select! {
                    _ = ctrl_c => info!("received ctrl-c"),
                    _ = sigterm.recv() => info!("received sigterm"),
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
                info!("received ctrl-c");
            }
            token.cancel();
        });
    }
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}
