use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Index entries. The id is derived from (source, seq) so a source's
    // chunks keep a stable, ordered addressing across re-ingestion.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id TEXT PRIMARY KEY,
            source TEXT NOT NULL,
            seq INTEGER NOT NULL,
            page INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_technical INTEGER NOT NULL DEFAULT 0,
            hash TEXT NOT NULL,
            embedding BLOB,
            UNIQUE(source, seq)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Per-source bookkeeping for list/remove.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            source TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            pages INTEGER NOT NULL,
            ingested_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // FTS5 virtual table for the lexical search path.
    // FTS5 CREATE is not idempotent natively, so we check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='entries_fts'",
    )
    .fetch_one(&pool)
    .await?;

    if !fts_exists {
        sqlx::query(
            r#"
            CREATE VIRTUAL TABLE entries_fts USING fts5(
                entry_id UNINDEXED,
                source UNINDEXED,
                text
            )
            "#,
        )
        .execute(&pool)
        .await?;
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_source ON entries(source)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
