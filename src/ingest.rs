//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for a file or directory: text extraction →
//! technical-aware chunking → embedding → index write. Each file becomes
//! one source named after its file name; re-ingesting a file replaces its
//! prior entries.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::chunker::chunk_pages;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::errors::PipelineError;
use crate::extract::extract_pages;
use crate::index::VectorIndex;

/// File extensions accepted when ingesting a directory.
const INGESTABLE_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

pub async fn run_ingest(config: &Config, path: &Path) -> Result<()> {
    let files = collect_files(path)?;
    if files.is_empty() {
        bail!("No ingestable files (.pdf, .txt, .md) found at {}", path.display());
    }

    let pool = db::connect(config).await?;
    let embedder = embedding::load_embedder(&config.embedding);
    let index = VectorIndex::new(pool.clone(), embedder);

    let mut total_chunks = 0usize;
    let mut failed = 0usize;

    for file in &files {
        match ingest_file(config, &index, &pool, file).await {
            Ok(count) => {
                let source = source_name(file);
                println!("  {} — {} chunks", source, count);
                total_chunks += count;
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {}", file.display(), e);
                failed += 1;
            }
        }
    }

    println!("ingest {}", path.display());
    println!("  files processed: {}", files.len() - failed);
    if failed > 0 {
        println!("  files skipped: {}", failed);
    }
    println!("  chunks written: {}", total_chunks);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Ingest one file: extract pages, chunk, index, record the source.
/// Returns the number of chunks written.
pub async fn ingest_file(
    config: &Config,
    index: &VectorIndex,
    pool: &SqlitePool,
    path: &Path,
) -> Result<usize, PipelineError> {
    let source = source_name(path);
    let pages = extract_pages(path)?;
    let chunks = chunk_pages(&source, &pages, config.chunking.max_chars);

    tracing::info!(source = %source, pages = pages.len(), chunks = chunks.len(), "ingesting document");

    let count = index.add(&source, &chunks).await?;
    record_source(pool, &source, path, pages.len()).await?;
    Ok(count)
}

/// A document's identifier is its file name, matching how callers refer to
/// it in ask/summarize/remove.
fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

async fn record_source(
    pool: &SqlitePool,
    source: &str,
    path: &Path,
    pages: usize,
) -> Result<(), PipelineError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO sources (source, path, pages, ingested_at) VALUES (?, ?, ?, ?)
        ON CONFLICT(source) DO UPDATE SET
            path = excluded.path,
            pages = excluded.pages,
            ingested_at = excluded.ingested_at
        "#,
    )
    .bind(source)
    .bind(path.display().to_string())
    .bind(pages as i64)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// A single file is taken as-is; a directory is walked for ingestable
/// extensions.
fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("Path does not exist: {}", path.display());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| INGESTABLE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    Ok(files)
}
