//! Error types for the docsiq query engine
//!
//! Every fallible pipeline stage maps onto one variant here, so the
//! orchestrator can log the precise failure while callers only ever see
//! either a validation message or a generic degraded message.

use thiserror::Error;

/// Main error type for the RAG query engine
#[derive(Error, Debug)]
pub enum RagError {
    /// Bad caller input (4xx-equivalent, never retried)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Embedding provider failure
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Vector store failure
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Completion provider failure (terminal for the query)
    #[error("Completion failed: {0}")]
    Completion(String),

    /// Completion rejected the prompt for exceeding the model's context
    /// window. The one retryable completion failure.
    #[error("Context window exceeded: {0}")]
    ContextOverflow(String),

    /// Cache backend failure; the pipeline degrades to a full run
    #[error("Cache error: {0}")]
    Cache(String),

    /// A stage exceeded its latency budget
    #[error("Stage {stage} timed out after {budget_ms}ms")]
    Timeout { stage: &'static str, budget_ms: u64 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client errors
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for query engine operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Message safe to surface to the caller.
    ///
    /// Validation failures describe the actual problem; every dependency
    /// failure collapses to one generic message so internal details never
    /// leak. Full detail stays in the operator logs.
    pub fn user_message(&self) -> String {
        match self {
            RagError::Validation(msg) => msg.clone(),
            _ => "Something went wrong while answering your question. Please try again."
                .to_string(),
        }
    }

    /// Short kind tag used in logs and failure records
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Validation(_) => "validation",
            RagError::Embedding(_) => "embedding",
            RagError::Retrieval(_) => "retrieval",
            RagError::Completion(_) => "completion",
            RagError::ContextOverflow(_) => "context_overflow",
            RagError::Cache(_) => "cache",
            RagError::Timeout { .. } => "timeout",
            RagError::Config(_) => "config",
            RagError::HttpError(_) => "http",
            RagError::SerializationError(_) => "serialization",
            RagError::IoError(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::Timeout {
            stage: "completion",
            budget_ms: 20000,
        };
        assert!(err.to_string().contains("completion"));
        assert!(err.to_string().contains("20000"));
    }

    #[test]
    fn test_validation_message_surfaces() {
        let err = RagError::Validation("Question cannot be empty".to_string());
        assert_eq!(err.user_message(), "Question cannot be empty");
    }

    #[test]
    fn test_dependency_errors_are_generic() {
        let errs = [
            RagError::Embedding("upstream 500".to_string()),
            RagError::Retrieval("connection refused".to_string()),
            RagError::Completion("upstream 503".to_string()),
            RagError::Cache("poisoned lock".to_string()),
        ];
        for err in errs {
            assert!(!err.user_message().contains("upstream"));
            assert!(!err.user_message().contains("poisoned"));
        }
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            RagError::ContextOverflow("8k limit".to_string()).kind(),
            "context_overflow"
        );
        assert_eq!(
            RagError::Timeout {
                stage: "embedding",
                budget_ms: 5000
            }
            .kind(),
            "timeout"
        );
    }
}
