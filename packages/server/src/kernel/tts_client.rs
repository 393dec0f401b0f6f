//! Adapter to the external TTS backend (§6). Out of scope per spec:
//! "text-to-speech synthesis (opaque byte producer with caching)". This
//! crate only implements the typed contract at the touchpoint: the
//! synthesize request/response shape and cache-key derivation, following
//! the same thin-trait-over-`reqwest` shape as `embedding_client`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct SynthesizeRequest {
    pub text: String,
    pub model: String,
    pub speed: f32,
    pub use_cache: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SynthesizeResponse {
    pub audio_hex: String,
    pub duration_sec: f64,
    pub model: String,
    pub cached: bool,
}

#[async_trait]
pub trait BaseTtsService: Send + Sync {
    async fn synthesize(&self, req: &SynthesizeRequest) -> anyhow::Result<SynthesizeResponse>;
}

/// `SHA-256(text|model|speed)`, the TTS cache key named in §5.
pub fn cache_key(text: &str, model: &str, speed: f32) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hasher.update(b"|");
    hasher.update(model.as_bytes());
    hasher.update(b"|");
    hasher.update(speed.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub struct TtsClient {
    http: reqwest::Client,
    base_url: String,
}

impl TtsClient {
    pub fn new(base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(180))
            .build()
            .expect("reqwest client builder should not fail");
        Self { http, base_url }
    }
}

#[async_trait]
impl BaseTtsService for TtsClient {
    async fn synthesize(&self, req: &SynthesizeRequest) -> anyhow::Result<SynthesizeResponse> {
        if !(48..=10_000).contains(&req.text.chars().count()) {
            anyhow::bail!(
                "tts text length {} outside allowed [48, 10000]",
                req.text.chars().count()
            );
        }

        let resp = self
            .http
            .post(format!("{}/synthesize", self.base_url))
            .json(req)
            .send()
            .await?
            .error_for_status()?;
        let body: SynthesizeResponse = resp.json().await?;

        if body.duration_sec <= 0.0 {
            anyhow::bail!("tts backend returned non-positive duration_sec");
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_stable_for_same_inputs() {
        assert_eq!(
            cache_key("hello there friend", "voice-a", 1.0),
            cache_key("hello there friend", "voice-a", 1.0)
        );
    }

    #[test]
    fn cache_key_differs_on_speed() {
        assert_ne!(
            cache_key("hello there friend", "voice-a", 1.0),
            cache_key("hello there friend", "voice-a", 1.25)
        );
    }
}
