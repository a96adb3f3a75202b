//! Prompt assembly
//!
//! Builds the completion prompt from the system instruction, the session's
//! recent exchanges (oldest first), the retrieved chunks, and the current
//! question, under a total token budget. When the budget would be
//! exceeded, chunks are dropped from the lowest-similarity end first;
//! memory is only dropped (oldest first) once no chunks remain. Grounding
//! wins over conversational continuity. The current question is never
//! truncated.

use crate::types::{Exchange, ScoredChunk};

/// Fixed system instruction for every query
pub const SYSTEM_PROMPT: &str = "You are DocsIQ, a helpful assistant for internal staff.\n\
Answer questions based on the provided context from company documents.\n\
If the context doesn't contain relevant information, say so clearly but still try to be helpful.\n\
Always be professional, concise, and helpful.";

const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// Rough token estimate, ~4 chars per token. Same unit as the model's
/// context limit for budgeting purposes.
pub fn estimate_tokens(text: &str) -> usize {
    text.len() / 4
}

/// The assembled prompt plus the chunks that actually made it in after
/// truncation. Source extraction must run over `chunks_used`, never the
/// full retrieved set, so citations always match content the model saw.
#[derive(Debug, Clone)]
pub struct BuiltPrompt {
    pub prompt: String,
    pub chunks_used: Vec<ScoredChunk>,
    pub memory_used: usize,
    pub estimated_tokens: usize,
}

/// Builds bounded prompts from retrieved chunks and session memory
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    max_prompt_tokens: usize,
}

impl ContextBuilder {
    pub fn new(max_prompt_tokens: usize) -> Self {
        Self { max_prompt_tokens }
    }

    /// Assemble the prompt. `chunks` must already be ordered by descending
    /// similarity; truncation pops from the tail.
    pub fn build(
        &self,
        question: &str,
        chunks: &[ScoredChunk],
        memory: &[Exchange],
    ) -> BuiltPrompt {
        let question_section = format!("Question: {}", question);
        let fixed_tokens = estimate_tokens(SYSTEM_PROMPT) + estimate_tokens(&question_section);

        let chunk_tokens: Vec<usize> = chunks
            .iter()
            .map(|c| estimate_tokens(&render_chunk(c)))
            .collect();
        let memory_tokens: Vec<usize> = memory
            .iter()
            .map(|e| estimate_tokens(&render_exchange(e)))
            .collect();

        let mut chunks_kept = chunks.len();
        let mut memory_start = 0;

        loop {
            let total = fixed_tokens
                + chunk_tokens[..chunks_kept].iter().sum::<usize>()
                + memory_tokens[memory_start..].iter().sum::<usize>();
            if total <= self.max_prompt_tokens {
                break;
            }
            if chunks_kept > 0 {
                chunks_kept -= 1;
            } else if memory_start < memory.len() {
                memory_start += 1;
            } else {
                // Only the system instruction and question remain
                break;
            }
        }

        let kept_chunks = chunks[..chunks_kept].to_vec();
        let kept_memory = &memory[memory_start..];
        let prompt = render_prompt(&question_section, &kept_chunks, kept_memory);
        let estimated_tokens = estimate_tokens(&prompt);

        BuiltPrompt {
            prompt,
            chunks_used: kept_chunks,
            memory_used: kept_memory.len(),
            estimated_tokens,
        }
    }
}

fn render_prompt(question_section: &str, chunks: &[ScoredChunk], memory: &[Exchange]) -> String {
    let history = if memory.is_empty() {
        "No previous conversation.".to_string()
    } else {
        memory
            .iter()
            .map(render_exchange)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let context = if chunks.is_empty() {
        "No relevant documents found.".to_string()
    } else {
        chunks
            .iter()
            .map(render_chunk)
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR)
    };

    format!(
        "{}\n\nPrevious conversation:\n{}\n\nContext from documents:\n{}\n\n{}",
        SYSTEM_PROMPT, history, context, question_section
    )
}

fn render_chunk(chunk: &ScoredChunk) -> String {
    format!("[From: {}]\n{}", chunk.chunk.source_name, chunk.chunk.text)
}

fn render_exchange(exchange: &Exchange) -> String {
    format!(
        "User: {}\nAssistant: {}",
        exchange.question, exchange.answer
    )
}
