//! Embedding client
//!
//! Turns question text into a fixed-dimension vector via an
//! OpenAI-compatible `/v1/embeddings` endpoint. Deterministic for
//! identical input under the same model version. No internal retry;
//! retry policy belongs to the orchestrator.

use crate::config::EmbeddingConfig;
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seam for embedding generation so the orchestrator can take any provider
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text into a vector of the provider's fixed dimension
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// The vector dimension this embedder produces
    fn dimension(&self) -> usize;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP embedder against an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
}

impl HttpEmbedder {
    pub fn new(config: &EmbeddingConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            dimension: config.dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RagError::Embedding(
                "Cannot embed empty text".to_string(),
            ));
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RagError::Embedding(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Malformed response: {}", e)))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| RagError::Embedding("Response contained no embedding".to_string()))?;

        if vector.len() != self.dimension {
            return Err(RagError::Embedding(format!(
                "Expected dimension {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbeddingConfig;

    fn test_embedder() -> HttpEmbedder {
        HttpEmbedder::new(&EmbeddingConfig::default(), None).unwrap()
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = test_embedder();
        let result = tokio_test::block_on(embedder.embed("   \n\t  "));
        assert!(matches!(result, Err(RagError::Embedding(_))));
    }

    #[test]
    fn test_request_serialization() {
        let request = EmbeddingRequest {
            model: "text-embedding-3-small".to_string(),
            input: "How do I create an invoice?".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "text-embedding-3-small");
        assert_eq!(json["input"], "How do I create an invoice?");
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"data":[{"embedding":[0.1,-0.2,0.3],"index":0}],"model":"text-embedding-3-small"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].embedding, vec![0.1, -0.2, 0.3]);
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let config = EmbeddingConfig {
            base_url: "https://api.example.com/".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = HttpEmbedder::new(&config, None).unwrap();
        assert_eq!(embedder.base_url, "https://api.example.com");
    }
}
