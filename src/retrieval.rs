//! Vector retrieval over the pre-indexed corpus
//!
//! The corpus is populated offline by the ingestion pipeline; this module
//! only reads. Results come back ordered by descending cosine similarity
//! with deterministic tie-breaking (ascending chunk_index, then source_id).

use crate::config::QdrantConfig;
use crate::errors::{RagError, Result};
use crate::types::{Chunk, ScoredChunk};
use async_trait::async_trait;
use qdrant_client::{
    client::QdrantClient,
    qdrant::{with_payload_selector::SelectorOptions, SearchPoints, WithPayloadSelector},
};
use std::cmp::Ordering;

/// Seam for similarity search so the orchestrator can take any backend
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Top-k most similar chunks for a query vector. An empty corpus
    /// yields an empty sequence, not an error.
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>>;

    /// Reachability probe for the health check
    async fn ping(&self) -> Result<()>;
}

/// Qdrant-backed retriever
pub struct QdrantRetriever {
    client: QdrantClient,
    collection: String,
    min_score: Option<f32>,
}

impl QdrantRetriever {
    pub fn new(config: &QdrantConfig, min_score: Option<f32>) -> Result<Self> {
        let url = format!("http://{}:{}", config.host, config.port);
        let client = QdrantClient::from_url(&url)
            .build()
            .map_err(|e| RagError::Retrieval(format!("Failed to create client: {}", e)))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            min_score,
        })
    }
}

#[async_trait]
impl VectorSearch for QdrantRetriever {
    async fn search(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredChunk>> {
        let search_result = self
            .client
            .search_points(&SearchPoints {
                collection_name: self.collection.clone(),
                vector: vector.to_vec(),
                limit: top_k as u64,
                with_payload: Some(WithPayloadSelector {
                    selector_options: Some(SelectorOptions::Enable(true)),
                }),
                score_threshold: self.min_score,
                ..Default::default()
            })
            .await
            .map_err(|e| RagError::Retrieval(format!("Search failed: {}", e)))?;

        let mut results: Vec<ScoredChunk> = search_result
            .result
            .into_iter()
            .map(|point| {
                let payload = point.payload;
                let chunk = Chunk {
                    id: point_id_to_string(&point.id),
                    text: payload_str(&payload, "text"),
                    source_id: payload_str(&payload, "source_id"),
                    source_name: payload_str(&payload, "source_name"),
                    source_url: payload_str(&payload, "source_url"),
                    chunk_index: payload_int(&payload, "chunk_index") as u32,
                };
                ScoredChunk {
                    chunk,
                    score: point.score,
                }
            })
            .collect();

        sort_by_similarity(&mut results);
        Ok(results)
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .list_collections()
            .await
            .map_err(|e| RagError::Retrieval(format!("Vector store unreachable: {}", e)))?;
        Ok(())
    }
}

/// Descending score, ties broken by ascending chunk_index then source_id.
/// Qdrant already orders by score; the tie-break keeps repeated queries
/// byte-identical when scores collide.
pub fn sort_by_similarity(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
            .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
    });
}

// Payload extraction helpers

fn payload_str(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> String {
    use qdrant_client::qdrant::value::Kind;
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::StringValue(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn payload_int(
    payload: &std::collections::HashMap<String, qdrant_client::qdrant::Value>,
    key: &str,
) -> i64 {
    use qdrant_client::qdrant::value::Kind;
    payload
        .get(key)
        .and_then(|v| v.kind.as_ref())
        .and_then(|kind| match kind {
            Kind::IntegerValue(i) => Some(*i),
            Kind::DoubleValue(f) => Some(*f as i64),
            _ => None,
        })
        .unwrap_or(0)
}

fn point_id_to_string(point_id: &Option<qdrant_client::qdrant::PointId>) -> String {
    point_id
        .as_ref()
        .map(|id| {
            use qdrant_client::qdrant::point_id::PointIdOptions;
            match &id.point_id_options {
                Some(PointIdOptions::Num(n)) => n.to_string(),
                Some(PointIdOptions::Uuid(u)) => u.clone(),
                None => "unknown".to_string(),
            }
        })
        .unwrap_or_else(|| "unknown".to_string())
}
