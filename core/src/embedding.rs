//! Embedding service abstraction and HTTP client.
//!
//! The engine treats embedding as a black box: text in, fixed-length
//! vector out, deterministic for a given input. The trait seam lets tests
//! substitute a mock embedder.

use crate::{MinervaError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// A service turning text into a fixed-length float vector.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// Configuration for the embedding client, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EmbeddingConfig {
    pub api_url: String,
    pub model: String,
    pub request_timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api_url: std::env::var("EMBEDDING_API_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://127.0.0.1:8080/v1/embeddings".to_string()),
            model: std::env::var("EMBEDDING_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "paraphrase-minilm-l3-v2".to_string()),
            request_timeout_ms: std::env::var("EMBEDDING_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30_000),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-style `/embeddings` endpoint.
#[derive(Clone)]
pub struct EmbeddingClient {
    http: reqwest::Client,
    cfg: EmbeddingConfig,
}

impl EmbeddingClient {
    pub fn new(cfg: EmbeddingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| MinervaError::Embedding(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, cfg })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(EmbeddingConfig::default())
    }
}

#[async_trait]
impl EmbeddingService for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(target: "embedding", url = %self.cfg.api_url, chars = text.len(), "Requesting embedding");

        let body = serde_json::json!({
            "model": self.cfg.model,
            "input": text,
        });

        let resp = self.http.post(&self.cfg.api_url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MinervaError::Embedding(format!(
                "Embedding API error: status={status} body={body}"
            )));
        }

        let parsed: EmbeddingsResponse = resp
            .json()
            .await
            .map_err(|e| MinervaError::Embedding(format!("Failed to parse embeddings JSON: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MinervaError::Embedding("Empty embeddings response".to_string()))
    }
}
