//! Sentence-embedding backends
//!
//! The engine does not run a model itself. It asks a backend for a vector
//! and leaves normalization and dimension checks to the fingerprint
//! generator. The HTTP client speaks the OpenAI-compatible `/embeddings`
//! request shape served by most local inference servers.

use async_trait::async_trait;
use epmatch_common::config::EmbeddingConfig;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::FingerprintError;

/// Source of fixed-dimension sentence embeddings
///
/// Implementations must be deterministic for identical input text.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed one text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FingerprintError>;

    /// Dimension of the vectors this backend produces
    fn dimension(&self) -> usize;

    /// Model identifier, for logging
    fn model_name(&self) -> &str;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// HTTP client for an OpenAI-compatible embeddings endpoint
///
/// No timeout or retry is applied here; callers bound the call themselves.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    http_client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingClient {
    /// Create a client from the `[embedding]` configuration section
    pub fn new(config: &EmbeddingConfig) -> Result<Self, FingerprintError> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| FingerprintError::Unavailable(format!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, FingerprintError> {
        if text.trim().is_empty() {
            return Err(FingerprintError::InvalidInput(
                "Text cannot be empty".to_string(),
            ));
        }

        debug!(
            endpoint = %self.endpoint,
            model = %self.model,
            chars = text.len(),
            "Requesting embedding"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: [text],
            })
            .send()
            .await
            .map_err(|e| FingerprintError::Unavailable(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FingerprintError::Unavailable(format!(
                "Embedding endpoint returned {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            FingerprintError::Unavailable(format!("Malformed embedding response: {}", e))
        })?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| FingerprintError::Unavailable("Embedding response had no data".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
