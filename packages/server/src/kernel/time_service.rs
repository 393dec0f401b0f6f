//! Real <-> future time mapping and NTP skew monitoring (§4.8 C8).
//!
//! The broadcast presents itself as living 500 years in the future; every
//! other component treats this crate as the single source of truth for
//! that offset rather than computing it independently. Grounded in shape
//! on the teacher's `kernel/deps.rs` capability-struct pattern: one small
//! `Arc`-shared service, constructed once in `ServerKernel` and handed to
//! whoever needs it.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::warn;

/// Skew beyond which the time service reports itself unhealthy (§4.8).
pub const SKEW_HEALTHY_THRESHOLD_MS: i64 = 250;

pub struct TimeService {
    year_offset: i64,
    ntp_pool_host: String,
    last_skew_ms: AtomicI64,
}

impl TimeService {
    pub fn new(year_offset: i64, ntp_pool_host: String) -> Self {
        Self {
            year_offset,
            ntp_pool_host,
            last_skew_ms: AtomicI64::new(0),
        }
    }

    pub fn now_real(&self) -> DateTime<Utc> {
        Utc::now()
    }

    pub fn now_future(&self) -> DateTime<Utc> {
        self.now_real() + ChronoDuration::days(365 * self.year_offset)
    }

    pub fn year_offset(&self) -> i64 {
        self.year_offset
    }

    pub fn skew_ms(&self) -> i64 {
        self.last_skew_ms.load(Ordering::Relaxed)
    }

    pub fn healthy(&self) -> bool {
        self.skew_ms().abs() <= SKEW_HEALTHY_THRESHOLD_MS
    }

    /// Poll the configured NTP host and record the measured offset. Any
    /// failure to reach the pool is itself treated as skew: the health
    /// check degrades rather than panics (§7 Degradation).
    pub async fn refresh_skew(&self) {
        match query_ntp_offset_ms(&self.ntp_pool_host).await {
            Ok(offset) => self.last_skew_ms.store(offset, Ordering::Relaxed),
            Err(e) => {
                warn!(error = %e, host = %self.ntp_pool_host, "ntp poll failed, marking skew unhealthy");
                self.last_skew_ms
                    .store(SKEW_HEALTHY_THRESHOLD_MS + 1, Ordering::Relaxed);
            }
        }
    }
}

/// Runs a real SNTP round-trip against `host` and returns the measured
/// clock offset in milliseconds. `sntpc`'s client is synchronous (a plain
/// `std::net::UdpSocket`), so the request runs on a blocking thread rather
/// than tying up the async runtime.
async fn query_ntp_offset_ms(host: &str) -> anyhow::Result<i64> {
    if host.is_empty() {
        anyhow::bail!("empty ntp host");
    }
    let addr = if host.contains(':') { host.to_string() } else { format!("{host}:123") };

    tokio::task::spawn_blocking(move || -> anyhow::Result<i64> {
        let socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        socket.set_read_timeout(Some(std::time::Duration::from_secs(2)))?;
        let context = sntpc::NtpContext::new(sntpc::StdTimestampGen::default());
        let result = sntpc::sync::get_time(addr.as_str(), &socket, context)
            .map_err(|e| anyhow::anyhow!("sntp request to {addr} failed: {e:?}"))?;
        Ok(result.offset / 1_000)
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_future_is_offset_by_configured_years() {
        let svc = TimeService::new(500, "pool.ntp.org".to_string());
        let diff = svc.now_future() - svc.now_real();
        assert!(diff.num_days() > 365 * 499);
        assert!(diff.num_days() < 365 * 501);
    }

    #[test]
    fn healthy_when_skew_within_threshold() {
        let svc = TimeService::new(500, "pool.ntp.org".to_string());
        svc.last_skew_ms.store(100, Ordering::Relaxed);
        assert!(svc.healthy());
    }

    #[test]
    fn unhealthy_when_skew_exceeds_threshold() {
        let svc = TimeService::new(500, "pool.ntp.org".to_string());
        svc.last_skew_ms.store(300, Ordering::Relaxed);
        assert!(!svc.healthy());
    }

    #[tokio::test]
    async fn refresh_skew_marks_unhealthy_on_empty_host() {
        let svc = TimeService::new(500, String::new());
        svc.refresh_skew().await;
        assert!(!svc.healthy());
    }
}
