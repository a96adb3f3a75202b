//! docsiq - RAG query engine
//!
//! Answers natural-language questions over a pre-indexed document corpus:
//! embed the question, retrieve the most similar chunks from the vector
//! store, assemble a bounded prompt with session memory, call the
//! completion model, and return a grounded answer with its sources.
//!
//! Ingestion, authentication, and transport live outside this crate; the
//! engine is a callable operation with a typed contract.

pub mod errors;
pub mod types;
pub mod config;

// Pipeline stages
pub mod embedding;
pub mod retrieval;
pub mod context;
pub mod completion;
pub mod sources;

// Shared mutable state
pub mod cache;
pub mod memory;

// Orchestration
pub mod pipeline;

// Re-export commonly used types
pub use errors::{RagError, Result};
pub use pipeline::RagPipeline;
pub use types::{Chunk, Exchange, HealthStatus, QueryAnswer, ScoredChunk};
