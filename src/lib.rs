//! # docqa
//!
//! Question answering over a private collection of uploaded technical
//! documents: ingestion, semantic retrieval, and grounded answer
//! composition (retrieval-augmented generation).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌───────────────┐
//! │ Extract  │──▶│   Chunker      │──▶│  VectorIndex  │
//! │ PDF/text │   │ technical-aware│   │ SQLite + FTS5 │
//! └──────────┘   └───────────────┘   └──────┬────────┘
//!                                           │ retrieve
//!              ┌────────────┐   ┌───────────▼────────┐
//!  question ──▶│ Classifier │──▶│  AnswerEngine      │──▶ sanitized answer
//!              └────────────┘   │  completion service │
//!                               └────────────────────┘
//! ```
//!
//! Embeddings come from a prioritized model chain loaded once at startup;
//! when no model loads, retrieval degrades to lexical FTS5 search with a
//! zero similarity score signaling the degraded mode.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-page text extraction |
//! | [`chunker`] | Technical-content-aware chunking |
//! | [`embedding`] | Embedding backend chain and vector utilities |
//! | [`index`] | Vector index with lexical fallback |
//! | [`classify`] | Query classification rule table |
//! | [`completion`] | Completion-service client |
//! | [`answer`] | Prompt composition and answer generation |
//! | [`sanitize`] | Response sanitization |
//! | [`ingest`] | Ingestion orchestration |
//! | [`server`] | HTTP adapter |

pub mod answer;
pub mod ask;
pub mod chunker;
pub mod classify;
pub mod completion;
pub mod config;
pub mod db;
pub mod embedding;
pub mod errors;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod sanitize;
pub mod search;
pub mod server;
pub mod sources;
pub mod summarize;
