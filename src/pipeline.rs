//! Query orchestration
//!
//! Composes cache, embedder, retriever, context builder, completion
//! client, source extraction, and session memory into one `answer_query`
//! operation. Owns the failure-handling state machine: a query either
//! commits a full exchange plus cache entry, or nothing at all.
//!
//! Every component is injected at construction; there is no process-wide
//! mutable state.

use crate::cache::{CachedAnswer, QueryCache};
use crate::completion::CompletionModel;
use crate::config::Config;
use crate::context::ContextBuilder;
use crate::embedding::Embedder;
use crate::errors::{RagError, Result};
use crate::memory::MemoryWindow;
use crate::retrieval::VectorSearch;
use crate::sources::extract_sources;
use crate::types::{Exchange, HealthStatus, QueryAnswer};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Maximum question length in characters, after trimming
const MAX_QUESTION_CHARS: usize = 1000;

/// Pipeline stages. One query moves strictly forward:
///
/// Received → CacheCheck → Done (hit), or
/// Received → CacheCheck → Embedding → Retrieval → ContextBuild →
/// Completion → SourceExtract → MemoryUpdate → CacheWrite → Done
///
/// Failed is reachable from any non-terminal stage and is recorded with
/// the originating error kind. Memory and cache are untouched on Failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Received,
    CacheCheck,
    Embedding,
    Retrieval,
    ContextBuild,
    Completion,
    SourceExtract,
    MemoryUpdate,
    CacheWrite,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether `next` is a legal successor of this stage
    pub fn can_advance_to(&self, next: Stage) -> bool {
        use Stage::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Received, CacheCheck)
                | (CacheCheck, Done)
                | (CacheCheck, Embedding)
                | (Embedding, Retrieval)
                | (Retrieval, ContextBuild)
                | (ContextBuild, Completion)
                | (Completion, SourceExtract)
                | (SourceExtract, MemoryUpdate)
                | (MemoryUpdate, CacheWrite)
                | (CacheWrite, Done)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::CacheCheck => "cache_check",
            Stage::Embedding => "embedding",
            Stage::Retrieval => "retrieval",
            Stage::ContextBuild => "context_build",
            Stage::Completion => "completion",
            Stage::SourceExtract => "source_extract",
            Stage::MemoryUpdate => "memory_update",
            Stage::CacheWrite => "cache_write",
            Stage::Done => "done",
            Stage::Failed => "failed",
        }
    }
}

/// Independent latency budgets per suspension point, so one slow
/// dependency cannot stall the whole pipeline
#[derive(Debug, Clone)]
pub struct StageBudgets {
    pub embedding: Duration,
    pub retrieval: Duration,
    pub completion: Duration,
    pub total: Duration,
}

impl StageBudgets {
    fn from_config(config: &Config) -> Self {
        Self {
            embedding: Duration::from_secs(config.embedding.timeout_secs),
            retrieval: Duration::from_secs(config.qdrant.timeout_secs),
            completion: Duration::from_secs(config.completion.timeout_secs),
            total: Duration::from_secs(config.pipeline.total_budget_secs),
        }
    }
}

/// The RAG orchestrator
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    retriever: Arc<dyn VectorSearch>,
    model: Arc<dyn CompletionModel>,
    cache: QueryCache,
    memory: MemoryWindow,
    context_builder: ContextBuilder,
    top_k: usize,
    budgets: StageBudgets,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        retriever: Arc<dyn VectorSearch>,
        model: Arc<dyn CompletionModel>,
        config: &Config,
    ) -> Self {
        Self {
            embedder,
            retriever,
            model,
            cache: QueryCache::new(config.cache_ttl(), config.cache.scope),
            memory: MemoryWindow::new(config.memory.window, config.session_idle()),
            context_builder: ContextBuilder::new(config.context.max_prompt_tokens),
            top_k: config.retrieval.top_k,
            budgets: StageBudgets::from_config(config),
        }
    }

    /// Answer a question for an authenticated caller within a session.
    ///
    /// Appends at most one exchange to session memory per successful call;
    /// retrying a successful call appends a duplicate. A failed or
    /// timed-out call leaves memory and cache untouched.
    pub async fn answer_query(
        &self,
        question: &str,
        session_id: &str,
        caller_id: &str,
    ) -> Result<QueryAnswer> {
        let question = question.trim().to_string();
        validate_question(&question)?;

        let budget = self.budgets.total;
        let result = match timeout(budget, self.run(&question, session_id, caller_id)).await {
            Ok(result) => result,
            // The dropped future never reached its memory/cache writes,
            // so a timed-out query has no observable side effects
            Err(_) => Err(RagError::Timeout {
                stage: "pipeline",
                budget_ms: budget.as_millis() as u64,
            }),
        };

        if let Err(err) = &result {
            error!(
                kind = err.kind(),
                session = session_id,
                caller = caller_id,
                error = %err,
                "Query failed"
            );
        }

        result
    }

    async fn run(
        &self,
        question: &str,
        session_id: &str,
        caller_id: &str,
    ) -> Result<QueryAnswer> {
        let mut stage = Stage::Received;

        self.advance(&mut stage, Stage::CacheCheck);
        match self.cache.get(question, session_id) {
            Ok(Some(hit)) => {
                info!(session = session_id, caller = caller_id, "Cache hit");
                self.advance(&mut stage, Stage::Done);
                return Ok(QueryAnswer {
                    answer: hit.answer,
                    sources: hit.sources,
                    session_id: session_id.to_string(),
                });
            }
            Ok(None) => {}
            // A broken cache degrades to the full pipeline instead of
            // failing the query
            Err(err) => warn!(error = %err, "Cache read failed, running full pipeline"),
        }

        self.advance(&mut stage, Stage::Embedding);
        let vector = self
            .stage_timeout("embedding", self.budgets.embedding, self.embedder.embed(question))
            .await?;

        self.advance(&mut stage, Stage::Retrieval);
        let chunks = self
            .stage_timeout(
                "retrieval",
                self.budgets.retrieval,
                self.retriever.search(&vector, self.top_k),
            )
            .await?;
        debug!(retrieved = chunks.len(), "Retrieval complete");

        self.advance(&mut stage, Stage::ContextBuild);
        let memory = match self.memory.get(session_id) {
            Ok(memory) => memory,
            Err(err) => {
                warn!(error = %err, "Memory read failed, continuing without history");
                Vec::new()
            }
        };
        let mut built = self.context_builder.build(question, &chunks, &memory);
        debug!(
            chunks_used = built.chunks_used.len(),
            memory_used = built.memory_used,
            estimated_tokens = built.estimated_tokens,
            "Prompt assembled"
        );

        self.advance(&mut stage, Stage::Completion);
        let answer = match self
            .stage_timeout("completion", self.budgets.completion, self.model.complete(&built.prompt))
            .await
        {
            Ok(answer) => answer,
            // The one retryable condition: shrink the context by the
            // lowest-similarity chunk and try exactly once more
            Err(RagError::ContextOverflow(detail)) if !built.chunks_used.is_empty() => {
                warn!(detail = %detail, "Context window exceeded, retrying with one fewer chunk");
                let reduced = built.chunks_used[..built.chunks_used.len() - 1].to_vec();
                built = self.context_builder.build(question, &reduced, &memory);
                self.stage_timeout(
                    "completion",
                    self.budgets.completion,
                    self.model.complete(&built.prompt),
                )
                .await?
            }
            Err(err) => return Err(err),
        };

        self.advance(&mut stage, Stage::SourceExtract);
        let sources = extract_sources(&built.chunks_used);

        self.advance(&mut stage, Stage::MemoryUpdate);
        self.memory.append(
            session_id,
            Exchange::new(question.to_string(), answer.clone(), sources.clone()),
        )?;

        self.advance(&mut stage, Stage::CacheWrite);
        let cached = CachedAnswer {
            answer: answer.clone(),
            sources: sources.clone(),
            session_id: session_id.to_string(),
        };
        if let Err(err) = self.cache.put(question, session_id, cached) {
            warn!(error = %err, "Cache write failed");
        }

        self.advance(&mut stage, Stage::Done);
        info!(
            session = session_id,
            caller = caller_id,
            sources = sources.len(),
            "Query answered"
        );

        Ok(QueryAnswer {
            answer,
            sources,
            session_id: session_id.to_string(),
        })
    }

    fn advance(&self, stage: &mut Stage, next: Stage) {
        debug_assert!(stage.can_advance_to(next), "illegal stage transition");
        debug!(from = stage.name(), to = next.name(), "Stage transition");
        *stage = next;
    }

    async fn stage_timeout<T, F>(
        &self,
        stage: &'static str,
        budget: Duration,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match timeout(budget, fut).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                stage,
                budget_ms: budget.as_millis() as u64,
            }),
        }
    }

    /// Drop every cached answer. Called by the ingestion pipeline when the
    /// corpus changes; carries no payload.
    pub fn invalidate_cache(&self) -> Result<()> {
        info!("Invalidating query cache after corpus change");
        self.cache.invalidate_all()
    }

    /// Reset a session's conversational memory (logout or explicit reset)
    pub fn clear_session(&self, session_id: &str) -> Result<()> {
        info!(session = session_id, "Clearing session memory");
        self.memory.clear(session_id)
    }

    /// Readiness of the engine's backends. Not on the query path, no auth.
    pub async fn health(&self) -> HealthStatus {
        let vector_store = match timeout(self.budgets.retrieval, self.retriever.ping()).await {
            Ok(Ok(())) => "connected",
            Ok(Err(err)) => {
                warn!(error = %err, "Vector store health probe failed");
                "disconnected"
            }
            Err(_) => "disconnected",
        };

        HealthStatus {
            status: "healthy".to_string(),
            vector_store: vector_store.to_string(),
            cache_entries: self.cache.len(),
        }
    }

    pub fn memory(&self) -> &MemoryWindow {
        &self.memory
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }
}

fn validate_question(question: &str) -> Result<()> {
    if question.is_empty() {
        return Err(RagError::Validation("Question cannot be empty".to_string()));
    }
    let chars = question.chars().count();
    if chars > MAX_QUESTION_CHARS {
        return Err(RagError::Validation(format!(
            "Question is too long: {} characters exceeds the {} character limit",
            chars, MAX_QUESTION_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_path_is_a_legal_chain() {
        use Stage::*;
        let chain = [
            Received,
            CacheCheck,
            Embedding,
            Retrieval,
            ContextBuild,
            Completion,
            SourceExtract,
            MemoryUpdate,
            CacheWrite,
            Done,
        ];
        for pair in chain.windows(2) {
            assert!(
                pair[0].can_advance_to(pair[1]),
                "{} -> {} should be legal",
                pair[0].name(),
                pair[1].name()
            );
        }
    }

    #[test]
    fn test_cache_hit_short_circuits() {
        assert!(Stage::CacheCheck.can_advance_to(Stage::Done));
        assert!(!Stage::Received.can_advance_to(Stage::Done));
    }

    #[test]
    fn test_failed_reachable_from_any_non_terminal() {
        use Stage::*;
        for stage in [
            Received,
            CacheCheck,
            Embedding,
            Retrieval,
            ContextBuild,
            Completion,
            SourceExtract,
            MemoryUpdate,
            CacheWrite,
        ] {
            assert!(stage.can_advance_to(Failed));
        }
        assert!(!Done.can_advance_to(Failed));
        assert!(!Failed.can_advance_to(Failed));
    }

    #[test]
    fn test_no_backwards_transitions() {
        assert!(!Stage::Completion.can_advance_to(Stage::Embedding));
        assert!(!Stage::Done.can_advance_to(Stage::CacheCheck));
    }

    #[test]
    fn test_question_validation() {
        assert!(validate_question("How do I create an invoice?").is_ok());
        assert!(matches!(
            validate_question(""),
            Err(RagError::Validation(_))
        ));
        let long = "a".repeat(1001);
        assert!(matches!(
            validate_question(&long),
            Err(RagError::Validation(_))
        ));
        let exactly_max = "b".repeat(1000);
        assert!(validate_question(&exactly_max).is_ok());
    }
}
