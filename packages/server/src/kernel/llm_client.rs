//! Adapter to the external LLM script-generation backend (§4.7 C7). Out of
//! scope per spec: "LLM script synthesis (treated as an opaque text
//! generator with a typed prompt)". This module only defines that typed
//! contract and a `reqwest`-backed implementation, mirroring the shape of
//! the teacher's `BaseAI` trait in `kernel/traits.rs` (one narrow method
//! with a sensible default-free implementation, no fallback chat history
//! machinery we don't need).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct ScriptPrompt {
    pub dj_persona: String,
    pub language: String,
    pub conversation_format: String,
    pub instructions: String,
    pub retrieved_chunks: Vec<String>,
    /// Set when retrying after an out-of-bounds script length (§4.7).
    pub corrective_instruction: Option<String>,
}

#[async_trait]
pub trait BaseLlmService: Send + Sync {
    async fn generate_script(&self, prompt: &ScriptPrompt) -> anyhow::Result<String>;
}

pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ScriptRequest<'a> {
    dj_persona: &'a str,
    language: &'a str,
    conversation_format: &'a str,
    instructions: &'a str,
    retrieved_chunks: &'a [String],
    corrective_instruction: &'a Option<String>,
}

#[derive(Deserialize)]
struct ScriptResponse {
    script: String,
}

impl LlmClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        let http = reqwest::Client::builder()
            // LLM generations run long; the worker's lease/heartbeat covers us.
            .timeout(Duration::from_secs(120))
            .build()
            .expect("reqwest client builder should not fail");
        Self { http, base_url, api_key }
    }
}

#[async_trait]
impl BaseLlmService for LlmClient {
    async fn generate_script(&self, prompt: &ScriptPrompt) -> anyhow::Result<String> {
        let mut req = self.http.post(format!("{}/generate", self.base_url)).json(&ScriptRequest {
            dj_persona: &prompt.dj_persona,
            language: &prompt.language,
            conversation_format: &prompt.conversation_format,
            instructions: &prompt.instructions,
            retrieved_chunks: &prompt.retrieved_chunks,
            corrective_instruction: &prompt.corrective_instruction,
        });
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?.error_for_status()?;
        let body: ScriptResponse = resp.json().await?;
        Ok(body.script)
    }
}

#[cfg(test)]
pub struct FakeLlmService {
    pub script: String,
}

#[cfg(test)]
#[async_trait]
impl BaseLlmService for FakeLlmService {
    async fn generate_script(&self, _prompt: &ScriptPrompt) -> anyhow::Result<String> {
        Ok(self.script.clone())
    }
}
