//! Chat completion client
//!
//! Single request/response against an OpenAI-compatible
//! `/v1/chat/completions` endpoint. No internal retry: the orchestrator
//! owns the one context-overflow retry, which is why overflow failures
//! are reported as a distinct error variant.

use crate::config::CompletionConfig;
use crate::errors::{RagError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Seam for the LLM call so the orchestrator can take any provider
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Produce an answer for an assembled prompt
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatErrorResponse {
    error: ChatErrorBody,
}

#[derive(Debug, Deserialize)]
struct ChatErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// HTTP completion client against an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct HttpCompletionClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl HttpCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(RagError::HttpError)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }
}

/// Classify an upstream failure body: context-window overflows get their
/// own variant so the orchestrator can shorten the prompt and retry once.
fn classify_upstream_error(body: &str) -> RagError {
    if let Ok(parsed) = serde_json::from_str::<ChatErrorResponse>(body) {
        let overflow = parsed
            .error
            .code
            .as_deref()
            .map(|c| c == "context_length_exceeded")
            .unwrap_or(false)
            || parsed.error.message.contains("maximum context length");
        if overflow {
            return RagError::ContextOverflow(parsed.error.message);
        }
        return RagError::Completion(parsed.error.message);
    }
    RagError::Completion(body.to_string())
}

#[async_trait]
impl CompletionModel for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.7,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RagError::Completion(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_upstream_error(&body));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| RagError::Completion(format!("Malformed response: {}", e)))?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(RagError::Completion(
                "Model returned an empty answer".to_string(),
            ));
        }

        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Open the billing tab."},"finish_reason":"stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content, "Open the billing tab.");
    }

    #[test]
    fn test_overflow_classified_by_code() {
        let body = r#"{"error":{"message":"This model's maximum context length is 8192 tokens","type":"invalid_request_error","code":"context_length_exceeded"}}"#;
        let err = classify_upstream_error(body);
        assert!(matches!(err, RagError::ContextOverflow(_)));
    }

    #[test]
    fn test_overflow_classified_by_message() {
        let body = r#"{"error":{"message":"Request exceeds the maximum context length of the model"}}"#;
        let err = classify_upstream_error(body);
        assert!(matches!(err, RagError::ContextOverflow(_)));
    }

    #[test]
    fn test_other_upstream_errors_terminal() {
        let body = r#"{"error":{"message":"Rate limit reached","code":"rate_limit_exceeded"}}"#;
        let err = classify_upstream_error(body);
        assert!(matches!(err, RagError::Completion(_)));
    }

    #[test]
    fn test_unparseable_error_body() {
        let err = classify_upstream_error("502 Bad Gateway");
        assert!(matches!(err, RagError::Completion(_)));
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: "prompt".to_string(),
            }],
            temperature: 0.7,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["model"], "gpt-4o-mini");
    }
}
