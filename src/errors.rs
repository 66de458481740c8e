//! Pipeline error taxonomy.
//!
//! Embedding unavailability is recovered internally (lexical degradation)
//! and never surfaces from `search`; the remaining variants are surfaced to
//! callers with the underlying cause attached. "No context found" is not an
//! error — see [`crate::models::AskOutcome::NoContext`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source file could not be read or its text extracted.
    #[error("ingestion failed for {path}: {reason}")]
    Ingestion { path: String, reason: String },

    /// No embedding model loaded. Consumers degrade to lexical search;
    /// this variant only escapes when an operation requires embeddings.
    #[error("no embedding model is available")]
    EmbeddingUnavailable,

    /// Storage-layer failure on add/search/delete.
    #[error("index storage error: {0}")]
    Index(#[from] sqlx::Error),

    /// Transport, quota, or timeout failure talking to the completion
    /// service.
    #[error("completion service error: {0}")]
    CompletionService(String),
}
