//! The `search` command: retrieval-only introspection over the index.
//!
//! Prints ranked hits without calling the completion service. In degraded
//! lexical mode every score is 0.0 and the output says so, keeping the
//! signal visible rather than indistinguishable from a perfect match.

use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::index::VectorIndex;

pub async fn run_search(
    config: &Config,
    query: &str,
    source: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let embedder = embedding::load_embedder(&config.embedding);
    let index = VectorIndex::new(pool.clone(), embedder);

    let k = limit.unwrap_or(config.retrieval.k);
    let semantic = index.semantic_enabled();
    let hits = index.search(query, k, source.as_deref()).await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    if !semantic {
        println!("(lexical mode — no embedding model loaded, scores unavailable)");
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} (page {})",
            i + 1,
            hit.score,
            hit.source,
            hit.page
        );
        let excerpt: String = hit.content.chars().take(160).collect();
        println!("    excerpt: \"{}\"", excerpt.replace('\n', " "));
        println!();
    }

    pool.close().await;
    Ok(())
}
