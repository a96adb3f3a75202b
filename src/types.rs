//! Core data model shared across the pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pre-embedded slice of a source document, produced offline by the
/// ingestion pipeline and read back through the vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_id: String,
    pub source_name: String,
    pub source_url: String,
    pub chunk_index: u32,
}

/// A retrieved chunk paired with its cosine similarity to the query vector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// One completed question/answer turn in a session. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub sources: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(question: String, answer: String, sources: Vec<String>) -> Self {
        Self {
            question,
            answer,
            sources,
            created_at: Utc::now(),
        }
    }
}

/// Result of a successful query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnswer {
    pub answer: String,
    /// Deduplicated source URLs, first-occurrence order
    pub sources: Vec<String>,
    pub session_id: String,
}

/// Structured readiness report for the engine's backends.
/// Not part of the query path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub vector_store: String,
    pub cache_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_timestamps() {
        let before = Utc::now();
        let exchange = Exchange::new(
            "q".to_string(),
            "a".to_string(),
            vec!["https://example.com/doc".to_string()],
        );
        assert!(exchange.created_at >= before);
        assert_eq!(exchange.sources.len(), 1);
    }

    #[test]
    fn test_chunk_serialization() {
        let chunk = Chunk {
            id: "c1".to_string(),
            text: "Invoices are created from the billing tab.".to_string(),
            source_id: "doc1".to_string(),
            source_name: "Billing Guide".to_string(),
            source_url: "https://drive.google.com/doc1".to_string(),
            chunk_index: 0,
        };
        let json = serde_json::to_string(&chunk).unwrap();
        let back: Chunk = serde_json::from_str(&json).unwrap();
        assert_eq!(back, chunk);
    }
}
