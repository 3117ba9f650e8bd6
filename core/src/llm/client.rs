use crate::{MinervaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::CompletionService;

/// Configuration for [`LlamaClient`] loaded from environment variables.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Completion endpoint, e.g. http://127.0.0.1:8080/completion
    pub api_url: String,
    pub n_predict: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("LLAMA_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://127.0.0.1:8080/completion".to_string()),
            n_predict: 200,
            temperature: 0.0,
            top_k: 20,
            request_timeout_ms: std::env::var("LLAMA_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// HTTP client for a llama.cpp-compatible `/completion` endpoint.
#[derive(Clone)]
pub struct LlamaClient {
    http: Client,
    cfg: LlmConfig,
}

impl LlamaClient {
    pub fn new(cfg: LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| MinervaError::Completion(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(LlmConfig::default())
    }
}

#[async_trait]
impl CompletionService for LlamaClient {
    async fn complete(&self, prompt: &str, stop: &[String]) -> Result<String> {
        debug!(
            target: "llm_client",
            url = %self.cfg.api_url,
            prompt_chars = prompt.len(),
            "POST completion"
        );

        let body = json!({
            "prompt": prompt,
            "n_predict": self.cfg.n_predict,
            "temperature": self.cfg.temperature,
            "top_k": self.cfg.top_k,
            "stop": stop,
        });

        let resp = self
            .http
            .post(&self.cfg.api_url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MinervaError::Completion(format!("Completion request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MinervaError::Completion(format!(
                "Completion API error: status={status} body={body}"
            )));
        }

        let parsed: CompletionResponse = resp
            .json()
            .await
            .map_err(|e| MinervaError::Completion(format!("Failed to parse completion JSON: {e}")))?;

        Ok(parsed.content.trim().to_string())
    }
}
