//! Embedding-backed vector index with lexical fallback.
//!
//! [`VectorIndex`] owns the SQLite pool and the process-lifetime embedding
//! backend. It is an explicitly constructed service object — no ambient
//! globals — so tests can substitute a fake embedder or none at all.
//!
//! Storage model: one `entries` row per chunk, id derived deterministically
//! from `(source, seq)`, embedding stored as an f32 BLOB or NULL when the
//! entry was written in lexical mode. A parallel FTS5 table carries the
//! lexical search path.
//!
//! Degraded mode: when no embedder is available (or a query-time embedding
//! call fails) `search` falls back to FTS5 keyword matching and reports
//! `score = 0.0` on every hit. The zero score is the documented signal that
//! no distance measure exists — it is never to be confused with a perfect
//! semantic match, which would also be a low score but comes from the
//! semantic path with real distances.
//!
//! Consistency: `add` and `delete` on the same source are serialized
//! through a per-source lock registry; a filtered `search` after `add`
//! returns observes the new entries. Sources are independent partitions —
//! no cross-source guarantee is made or needed.

use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob, TextEmbedder};
use crate::errors::PipelineError;
use crate::models::{Chunk, ContextHit, IndexInfo};

/// Collection name reported by [`VectorIndex::describe`].
const INDEX_NAME: &str = "documents";

/// Abbreviation expansions applied to embed inputs at both index and query
/// time, improving recall on short technical acronyms.
const QUERY_EXPANSIONS: &[(&str, &str)] = &[
    ("ai", "artificial intelligence"),
    ("ml", "machine learning"),
    ("nlp", "natural language processing"),
    ("cv", "computer vision"),
    ("llm", "large language model"),
    ("framework", "framework methodology approach"),
    ("verification", "verification validation testing"),
    ("bregman", "bregman divergence loss function"),
    ("squared", "squared error loss function"),
];

pub struct VectorIndex {
    pool: SqlitePool,
    embedder: Option<Arc<dyn TextEmbedder>>,
    /// Per-source mutual exclusion for add/delete. Reads take no lock.
    source_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool, embedder: Option<Arc<dyn TextEmbedder>>) -> Self {
        Self {
            pool,
            embedder,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a semantic backend is loaded. False means every search runs
    /// in degraded lexical mode.
    pub fn semantic_enabled(&self) -> bool {
        self.embedder.is_some()
    }

    async fn lock_for(&self, source: &str) -> Arc<Mutex<()>> {
        let mut locks = self.source_locks.lock().await;
        locks
            .entry(source.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn embedder(&self) -> Result<&Arc<dyn TextEmbedder>, PipelineError> {
        self.embedder.as_ref().ok_or(PipelineError::EmbeddingUnavailable)
    }

    /// Store a document's chunks, replacing any prior entries for the same
    /// source (re-ingesting a filename never appends duplicate ids).
    ///
    /// The batch is atomic: either every entry is stored with an embedding,
    /// or — after any embedding failure — every entry is stored without
    /// one, so similarity scores within a source are never a mix of
    /// embedded and non-embedded entries. Returns the number of entries
    /// written.
    pub async fn add(&self, source: &str, chunks: &[Chunk]) -> Result<usize, PipelineError> {
        let lock = self.lock_for(source).await;
        let _guard = lock.lock().await;

        let vectors = self.embed_batch(chunks).await;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entries_fts WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM entries WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;

        for (seq, chunk) in chunks.iter().enumerate() {
            let id = entry_id(source, seq);
            let blob = vectors.as_ref().map(|vs| vec_to_blob(&vs[seq]));

            sqlx::query(
                r#"
                INSERT INTO entries (id, source, seq, page, text, is_technical, hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(source)
            .bind(seq as i64)
            .bind(chunk.page as i64)
            .bind(&chunk.content)
            .bind(chunk.is_technical as i64)
            .bind(hash_text(&chunk.content))
            .bind(blob)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO entries_fts (entry_id, source, text) VALUES (?, ?, ?)")
                .bind(&id)
                .bind(source)
                .bind(&chunk.content)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(chunks.len())
    }

    /// Embed all chunk texts in one batch, or `None` when the whole batch
    /// must fall back to lexical storage. Embedding trouble is recovered
    /// here by degrading, never propagated.
    async fn embed_batch(&self, chunks: &[Chunk]) -> Option<Vec<Vec<f32>>> {
        let embedder = match self.embedder() {
            Ok(e) => e,
            Err(e) => {
                tracing::debug!("{e}; storing batch lexically");
                return None;
            }
        };
        if chunks.is_empty() {
            return Some(Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|c| expand_text(&c.content)).collect();
        match embedder.embed(&texts).await {
            Ok(vectors) if vectors.len() == chunks.len() => Some(vectors),
            Ok(_) => {
                tracing::warn!("embedding batch returned wrong arity; storing batch lexically");
                None
            }
            Err(e) => {
                tracing::warn!("embedding batch failed: {e}; storing batch lexically");
                None
            }
        }
    }

    /// Retrieve the `k` most similar entries, optionally restricted to one
    /// source. Results are ordered ascending by score (cosine distance).
    ///
    /// Degrades transparently to lexical search — with `score = 0.0` on
    /// every hit — when no embedder is loaded or the query embedding
    /// fails. Embedding trouble is logged and recovered here, never
    /// surfaced as an error.
    pub async fn search(
        &self,
        query: &str,
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ContextHit>, PipelineError> {
        match self.embedder() {
            Ok(embedder) => {
                let expanded = expand_text(query);
                match embedder.embed(&[expanded]).await {
                    Ok(mut vectors) if !vectors.is_empty() => {
                        let query_vec = vectors.remove(0);
                        return self.semantic_search(&query_vec, k, source_filter).await;
                    }
                    Ok(_) => {
                        tracing::warn!("query embedding returned no vector; using lexical search");
                    }
                    Err(e) => {
                        tracing::warn!("query embedding failed: {e}; using lexical search");
                    }
                }
            }
            Err(e) => {
                tracing::debug!("{e}; using lexical search");
            }
        }
        self.lexical_search(query, k, source_filter).await
    }

    /// Brute-force cosine scan over stored vectors. Entries written in
    /// lexical mode (NULL embedding) carry no distance and are skipped.
    async fn semantic_search(
        &self,
        query_vec: &[f32],
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ContextHit>, PipelineError> {
        let rows = match source_filter {
            Some(source) => {
                sqlx::query(
                    "SELECT source, page, text, embedding FROM entries
                     WHERE embedding IS NOT NULL AND source = ?",
                )
                .bind(source)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT source, page, text, embedding FROM entries
                     WHERE embedding IS NOT NULL",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut hits: Vec<ContextHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                let page: i64 = row.get("page");
                ContextHit {
                    content: row.get("text"),
                    source: row.get("source"),
                    page: page as u32,
                    score: cosine_distance(query_vec, &vec),
                }
            })
            .collect();

        hits.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    /// FTS5 keyword search. Every hit reports `score = 0.0`: no distance
    /// measure is invented for lexical matches.
    async fn lexical_search(
        &self,
        query: &str,
        k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<ContextHit>, PipelineError> {
        let match_expr = fts_match_expression(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let rows = match source_filter {
            Some(source) => {
                sqlx::query(
                    r#"
                    SELECT e.source, e.page, e.text
                    FROM entries_fts
                    JOIN entries e ON e.id = entries_fts.entry_id
                    WHERE entries_fts MATCH ? AND entries_fts.source = ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(&match_expr)
                .bind(source)
                .bind(k as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT e.source, e.page, e.text
                    FROM entries_fts
                    JOIN entries e ON e.id = entries_fts.entry_id
                    WHERE entries_fts MATCH ?
                    ORDER BY rank
                    LIMIT ?
                    "#,
                )
                .bind(&match_expr)
                .bind(k as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| {
                let page: i64 = row.get("page");
                ContextHit {
                    content: row.get("text"),
                    source: row.get("source"),
                    page: page as u32,
                    score: 0.0,
                }
            })
            .collect())
    }

    /// Remove every entry whose source matches. All-or-nothing: the
    /// transaction either deletes the full source or nothing. Returns
    /// whether anything was removed; deleting an absent source is `false`,
    /// not an error.
    pub async fn delete(&self, source: &str) -> Result<bool, PipelineError> {
        let lock = self.lock_for(source).await;
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM entries_fts WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM entries WHERE source = ?")
            .bind(source)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted > 0)
    }

    /// Introspection only: entry count and collection name.
    pub async fn describe(&self) -> Result<IndexInfo, PipelineError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries")
            .fetch_one(&self.pool)
            .await?;
        Ok(IndexInfo {
            count,
            name: INDEX_NAME.to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Deterministic entry id: `{source}_{seq}`. Stable across re-ingestion,
/// which keeps source-scoped deletion and page-range reporting simple.
fn entry_id(source: &str, seq: usize) -> String {
    format!("{}_{}", source, seq)
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Append abbreviation expansions after matching words. Applied to embed
/// inputs only — stored text is never rewritten.
pub fn expand_text(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for token in text.split_whitespace() {
        let word: String = token
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect::<String>()
            .to_lowercase();
        out.push(token.to_string());
        if let Some((_, expansion)) = QUERY_EXPANSIONS.iter().find(|(abbr, _)| *abbr == word) {
            out.push(expansion.to_string());
        }
    }
    out.join(" ")
}

/// Build a safe FTS5 MATCH expression: alphanumeric tokens, each quoted,
/// joined with OR. Arbitrary user input can never produce an FTS syntax
/// error; no tokens means no results.
fn fts_match_expression(query: &str) -> String {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();
    tokens.join(" OR ")
}
