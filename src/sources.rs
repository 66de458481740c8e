//! Source bookkeeping: per-source statistics and removal.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::errors::PipelineError;
use crate::index::VectorIndex;
use crate::models::SourceStats;

/// Per-source chunk and page statistics, ordered by source name.
pub async fn list_source_stats(pool: &SqlitePool) -> Result<Vec<SourceStats>, PipelineError> {
    let rows = sqlx::query(
        r#"
        SELECT source,
               COUNT(*) AS chunks,
               MIN(page) AS min_page,
               MAX(page) AS max_page,
               SUM(LENGTH(text)) AS content_length
        FROM entries
        GROUP BY source
        ORDER BY source
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let min_page: Option<i64> = row.get("min_page");
            let max_page: Option<i64> = row.get("max_page");
            let pages = match (min_page, max_page) {
                (Some(lo), Some(hi)) => format!("{}-{}", lo, hi),
                _ => "N/A".to_string(),
            };
            SourceStats {
                source: row.get("source"),
                chunks: row.get("chunks"),
                pages,
                content_length: row.get::<Option<i64>, _>("content_length").unwrap_or(0),
            }
        })
        .collect())
}

/// Remove a source's entries and its bookkeeping row. Returns whether the
/// index held anything for it.
pub async fn remove_source(
    index: &VectorIndex,
    pool: &SqlitePool,
    source: &str,
) -> Result<bool, PipelineError> {
    let deleted = index.delete(source).await?;
    sqlx::query("DELETE FROM sources WHERE source = ?")
        .bind(source)
        .execute(pool)
        .await?;
    Ok(deleted)
}

pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let stats = list_source_stats(&pool).await?;

    if stats.is_empty() {
        println!("No documents ingested.");
        pool.close().await;
        return Ok(());
    }

    println!("{:<40} {:>8} {:>12} {:>10}", "SOURCE", "CHUNKS", "PAGES", "LENGTH");
    let mut total_chunks = 0i64;
    for s in &stats {
        println!(
            "{:<40} {:>8} {:>12} {:>10}",
            s.source, s.chunks, s.pages, s.content_length
        );
        total_chunks += s.chunks;
    }
    println!();
    println!("  documents: {}", stats.len());
    println!("  total chunks: {}", total_chunks);

    pool.close().await;
    Ok(())
}

pub async fn run_remove(config: &Config, source: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    // Removal never embeds; skip model loading.
    let index = VectorIndex::new(pool.clone(), None);

    let deleted = remove_source(&index, &pool, source).await?;
    if deleted {
        println!("Removed {}", source);
    } else {
        println!("Nothing indexed for {}", source);
    }

    pool.close().await;
    Ok(())
}
