use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_port: u16,

    /// Years added to `now_real()` to produce `now_future()` (§4.8).
    pub future_year_offset: i64,

    /// NTP host polled to measure clock skew (§4.8).
    pub ntp_pool_host: String,

    /// Default lease duration for claimed jobs (§4.1).
    pub lease_seconds: i64,
    /// How often the janitor sweep runs (§4.1).
    pub janitor_interval_secs: u64,

    /// Worker concurrency cap per instance (§4.9).
    pub worker_concurrency: usize,
    /// Heartbeat interval for in-flight jobs (§4.9).
    pub heartbeat_interval_secs: u64,
    /// Consecutive failures of one job type before the poison-pill cooldown (§4.9).
    pub poison_pill_threshold: u32,
    /// Cooldown duration once the poison-pill threshold is hit.
    pub poison_pill_cooldown_secs: u64,
    /// Drain window allowed for in-flight jobs during graceful shutdown.
    pub shutdown_drain_secs: u64,

    /// How far ahead the Scheduler materializes segments (§4.5).
    pub schedule_horizon_hours: i64,
    /// How often the Scheduler ticks.
    pub schedule_tick_secs: u64,
    /// Default lead time between `segment_make` enqueue and `scheduled_start_ts`.
    pub default_lead_time_secs: i64,

    pub embedding_backend_url: String,
    pub embedding_api_key: Option<String>,
    pub llm_backend_url: String,
    pub llm_api_key: Option<String>,
    pub tts_backend_url: String,
}

impl Config {
    /// Load configuration from environment variables, loading a `.env` file
    /// first if one is present (development convenience, mirrors the
    /// teacher's `dotenvy::dotenv()` call in `config.rs`).
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            http_port: env_or("HTTP_PORT", "8080")?,
            future_year_offset: env_or("FUTURE_YEAR_OFFSET", "500")?,
            ntp_pool_host: env::var("NTP_POOL_HOST")
                .unwrap_or_else(|_| "pool.ntp.org".to_string()),
            lease_seconds: env_or("LEASE_SECONDS", "60")?,
            janitor_interval_secs: env_or("JANITOR_INTERVAL_SECS", "30")?,
            worker_concurrency: env_or("WORKER_CONCURRENCY", "8")?,
            heartbeat_interval_secs: env_or("HEARTBEAT_INTERVAL_SECS", "30")?,
            poison_pill_threshold: env_or("POISON_PILL_THRESHOLD", "5")?,
            poison_pill_cooldown_secs: env_or("POISON_PILL_COOLDOWN_SECS", "300")?,
            shutdown_drain_secs: env_or("SHUTDOWN_DRAIN_SECS", "30")?,
            schedule_horizon_hours: env_or("SCHEDULE_HORIZON_HOURS", "24")?,
            schedule_tick_secs: env_or("SCHEDULE_TICK_SECS", "900")?,
            default_lead_time_secs: env_or("DEFAULT_LEAD_TIME_SECS", "1800")?,
            embedding_backend_url: env::var("EMBEDDING_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:9100".to_string()),
            embedding_api_key: env::var("EMBEDDING_API_KEY").ok(),
            llm_backend_url: env::var("LLM_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:9200".to_string()),
            llm_api_key: env::var("LLM_API_KEY").ok(),
            tts_backend_url: env::var("TTS_BACKEND_URL")
                .unwrap_or_else(|_| "http://localhost:9300".to_string()),
        })
    }

    pub fn lease_duration(&self) -> Duration {
        Duration::from_secs(self.lease_seconds.max(0) as u64)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} must be a valid value: {}", key, e))
}
