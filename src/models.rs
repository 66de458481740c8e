//! Core data models used throughout docqa.
//!
//! These types represent the chunks, retrieved context, and per-source
//! statistics that flow through the ingestion and question-answering pipeline.

use serde::Serialize;

/// A contiguous span of a document's extracted text, treated as one
/// retrieval unit. Produced by the chunker; immutable once created.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    /// 1-based page number the chunk was extracted from.
    pub page: u32,
    /// Document identifier (the ingested file's name).
    pub source: String,
    /// Whether the joined content matches the technical-content detector.
    pub is_technical: bool,
}

/// One retrieved chunk with its similarity score.
///
/// Ordered ascending by `score` (cosine distance; lower = more similar).
/// A score of exactly `0.0` on every hit signals degraded lexical mode —
/// no distance measure is available without embeddings.
#[derive(Debug, Clone, Serialize)]
pub struct ContextHit {
    pub content: String,
    pub source: String,
    pub page: u32,
    pub score: f32,
}

/// Index introspection summary.
#[derive(Debug, Clone, Serialize)]
pub struct IndexInfo {
    pub count: i64,
    pub name: String,
}

/// Per-source statistics reported by `list_sources`.
#[derive(Debug, Clone, Serialize)]
pub struct SourceStats {
    pub source: String,
    pub chunks: i64,
    /// Page span as "min-max", or "N/A" for a source with no pages.
    pub pages: String,
    pub content_length: i64,
}

/// Outcome of a `summarize` operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummarizeOutcome {
    Summary {
        source: String,
        summary: String,
        chunks_used: usize,
        /// Page span of the chunks the summary drew on, as "min-max".
        pages: String,
    },
    NotFound {
        message: String,
        suggestion: String,
    },
}

/// Outcome of an `ask` operation.
///
/// `NoContext` is a valid, non-exceptional result: zero relevant chunks were
/// found, and the caller can offer an alternative action instead of treating
/// it as a fault.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AskOutcome {
    Answer {
        answer: String,
        /// Cited (source, page) pairs, in retrieval order.
        citations: Vec<(String, u32)>,
    },
    NoContext {
        message: String,
        suggestion: String,
    },
}
