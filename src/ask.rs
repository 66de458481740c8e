//! The `ask` operation: retrieve grounding context and compose an answer.
//!
//! Zero retrieved chunks is a structured [`AskOutcome::NoContext`] result,
//! not an error — callers can suggest an alternative action instead of
//! reporting a fault.

use anyhow::Result;
use std::sync::Arc;

use crate::answer::AnswerEngine;
use crate::completion::CompletionClient;
use crate::config::Config;
use crate::db;
use crate::embedding;
use crate::errors::PipelineError;
use crate::index::VectorIndex;
use crate::models::AskOutcome;

/// Answer a question against the index, optionally scoped to one source.
pub async fn ask(
    index: &VectorIndex,
    engine: &AnswerEngine,
    config: &Config,
    question: &str,
    source_filter: Option<&str>,
) -> Result<AskOutcome, PipelineError> {
    let k = match source_filter {
        Some(_) => config.retrieval.k_scoped,
        None => config.retrieval.k,
    };

    let hits = index.search(question, k, source_filter).await?;

    if hits.is_empty() {
        let (message, suggestion) = match source_filter {
            Some(source) => (
                format!("I couldn't find relevant information in '{}'.", source),
                "Try rephrasing your query or selecting a different document.".to_string(),
            ),
            None => (
                "I couldn't find relevant information in the uploaded documents.".to_string(),
                "Try rephrasing your question or ingesting more documents.".to_string(),
            ),
        };
        return Ok(AskOutcome::NoContext { message, suggestion });
    }

    let answer = engine.answer(question, &hits).await?;

    let mut citations: Vec<(String, u32)> = Vec::new();
    for hit in &hits {
        let citation = (hit.source.clone(), hit.page);
        if !citations.contains(&citation) {
            citations.push(citation);
        }
    }

    Ok(AskOutcome::Answer { answer, citations })
}

pub async fn run_ask(config: &Config, question: &str, source: Option<String>) -> Result<()> {
    let pool = db::connect(config).await?;
    let embedder = embedding::load_embedder(&config.embedding);
    let index = VectorIndex::new(pool.clone(), embedder);
    let completer = Arc::new(CompletionClient::new(&config.completion)?);
    let engine = AnswerEngine::new(completer);

    let outcome = ask(&index, &engine, config, question, source.as_deref()).await?;

    match outcome {
        AskOutcome::Answer { answer, citations } => {
            println!("{}", answer);
            println!();
            println!("Sources:");
            for (source, page) in citations {
                println!("  {} (page {})", source, page);
            }
        }
        AskOutcome::NoContext { message, suggestion } => {
            println!("{}", message);
            println!("{}", suggestion);
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::GenerationParams;
    use crate::completion::Completer;
    use crate::config::DbConfig;
    use crate::models::Chunk;
    use async_trait::async_trait;

    struct CannedCompleter;

    #[async_trait]
    impl Completer for CannedCompleter {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> anyhow::Result<String> {
            let mut s = String::new();
            for i in 0..40 {
                s.push_str(&format!("Grounded sentence {i} with supporting detail. "));
            }
            Ok(s)
        }
    }

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            db: DbConfig {
                path: dir.join("docqa.sqlite"),
            },
            chunking: Default::default(),
            retrieval: Default::default(),
            embedding: crate::config::EmbeddingConfig {
                provider: "disabled".to_string(),
                ..Default::default()
            },
            completion: Default::default(),
            server: Default::default(),
        }
    }

    fn chunk(content: &str, page: u32, source: &str) -> Chunk {
        Chunk {
            content: content.to_string(),
            page,
            source: source.to_string(),
            is_technical: false,
        }
    }

    #[tokio::test]
    async fn test_ask_returns_answer_with_citations() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = test_config(tmp.path());
        crate::migrate::run_migrations(&config).await.unwrap();
        let pool = db::connect(&config).await.unwrap();
        let index = VectorIndex::new(pool, None);
        let engine = AnswerEngine::new(Arc::new(CannedCompleter));

        index
            .add("paper.pdf", &[chunk("training dynamics discussion", 3, "paper.pdf")])
            .await
            .unwrap();

        let outcome = ask(&index, &engine, &config, "training dynamics", None)
            .await
            .unwrap();
        match outcome {
            AskOutcome::Answer { answer, citations } => {
                assert!(answer.contains("Grounded sentence"));
                assert_eq!(citations, vec![("paper.pdf".to_string(), 3)]);
            }
            other => panic!("expected answer, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ask_with_no_matches_is_no_context() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = test_config(tmp.path());
        crate::migrate::run_migrations(&config).await.unwrap();
        let pool = db::connect(&config).await.unwrap();
        let index = VectorIndex::new(pool, None);
        let engine = AnswerEngine::new(Arc::new(CannedCompleter));

        let outcome = ask(&index, &engine, &config, "anything", Some("ghost.pdf"))
            .await
            .unwrap();
        match outcome {
            AskOutcome::NoContext { message, .. } => {
                assert!(message.contains("ghost.pdf"));
            }
            other => panic!("expected no-context, got {other:?}"),
        }
    }
}
