//! Adapter to the external embedding backend (§4.3 C3). Grounded on the
//! teacher's `common::utils::embeddings::EmbeddingService` /
//! `BaseEmbeddingService` trait: a thin `reqwest` client behind a trait so
//! it can be swapped for a fake in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[async_trait]
pub trait BaseEmbeddingService: Send + Sync {
    /// Produce a 1024-dimension embedding vector for `text`.
    async fn generate(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

pub struct EmbeddingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl EmbeddingClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            // Embedding calls carry a short timeout; failures are transient
            // and retried with backoff rather than stalling a worker slot.
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client builder should not fail");
        Self { http, base_url, api_key }
    }
}

#[async_trait]
impl BaseEmbeddingService for EmbeddingClient {
    async fn generate(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let mut req = self
            .http
            .post(format!("{}/embeddings", self.base_url))
            .json(&EmbeddingRequest { input: text });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?.error_for_status()?;
        let body: EmbeddingResponse = resp.json().await?;

        if body.embedding.len() != 1024 {
            anyhow::bail!(
                "embedding backend returned {} dims, expected 1024",
                body.embedding.len()
            );
        }
        Ok(body.embedding)
    }
}

#[cfg(test)]
pub struct FakeEmbeddingService {
    pub dims: usize,
}

#[cfg(test)]
#[async_trait]
impl BaseEmbeddingService for FakeEmbeddingService {
    async fn generate(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let seed = text.len() as f32;
        Ok((0..self.dims).map(|i| (seed + i as f32).sin()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_service_returns_requested_dims() {
        let svc = FakeEmbeddingService { dims: 1024 };
        let v = svc.generate("hello world").await.unwrap();
        assert_eq!(v.len(), 1024);
    }
}
