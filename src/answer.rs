//! Prompt composition and answer generation.
//!
//! [`AnswerEngine::answer`] runs the per-request flow: classify the
//! question, format the retrieved context into `Source/Page/Content`
//! blocks with emphasis on mathematical spans, call the completion service
//! with classification-selected parameters, escalate to an expansion pass
//! when the first answer looks too terse, and sanitize the result.
//!
//! An empty context short-circuits to a fixed apology without any
//! completion call. A failed expansion falls back to the brief answer with
//! an incompleteness note rather than failing the request; only a failure
//! of the primary generation surfaces as an error.

use regex::Regex;
use std::sync::Arc;
use std::sync::LazyLock;

use crate::classify::{classify, GenerationParams, QueryClass};
use crate::completion::Completer;
use crate::errors::PipelineError;
use crate::models::ContextHit;
use crate::sanitize::sanitize;

/// Returned, already sanitized, when retrieval produced nothing.
pub const NO_CONTEXT_MESSAGE: &str =
    "I couldn't find any relevant information in the uploaded documents to answer your question.";

/// Appended when the expansion pass fails and the brief answer is returned
/// as-is.
const INCOMPLETE_NOTE: &str = "(Note: this answer may be incomplete.)";

/// Per-hit content budget inside the prompt.
const CONTEXT_CONTENT_CHARS: usize = 500;

static MATH_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[^$\n]+\$").expect("static math span pattern"));

static LABELED_STATEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((?:definition|theorem|lemma|corollary|proposition|proof)\s*\d*\s*:)")
        .expect("static statement label pattern")
});

pub struct AnswerEngine {
    completer: Arc<dyn Completer>,
}

impl AnswerEngine {
    pub fn new(completer: Arc<dyn Completer>) -> Self {
        Self { completer }
    }

    /// Answer a question grounded in the retrieved context.
    pub async fn answer(
        &self,
        question: &str,
        context: &[ContextHit],
    ) -> Result<String, PipelineError> {
        if context.is_empty() {
            return Ok(NO_CONTEXT_MESSAGE.to_string());
        }

        let class = classify(question);
        let params = class.params();
        let context_text = format_context(context);
        let prompt = compose_prompt(class, question, &context_text);

        let draft = self
            .completer
            .complete(&prompt, params)
            .await
            .map_err(|e| PipelineError::CompletionService(format!("{e:#}")))?;

        let answer = if is_too_brief(&draft, question) {
            self.expand(question, &context_text, &draft, params).await
        } else {
            draft
        };

        Ok(sanitize(&answer))
    }

    /// Generate a document summary from source-scoped context.
    pub async fn summarize(&self, context: &[ContextHit]) -> Result<String, PipelineError> {
        let context_text: Vec<&str> = context.iter().map(|h| h.content.as_str()).collect();
        let prompt = format!(
            "Please provide a comprehensive summary of the following document content:\n\n{}\n\nSummary:",
            context_text.join("\n\n")
        );
        let params = GenerationParams {
            temperature: 0.1,
            max_tokens: 800,
        };

        let summary = self
            .completer
            .complete(&prompt, params)
            .await
            .map_err(|e| PipelineError::CompletionService(format!("{e:#}")))?;

        Ok(sanitize(&summary))
    }

    /// Re-prompt for a more detailed rewrite of a too-brief answer. A
    /// failure here returns the brief answer annotated, never an error.
    async fn expand(
        &self,
        question: &str,
        context_text: &str,
        brief: &str,
        params: GenerationParams,
    ) -> String {
        let prompt = format!(
            "Based on the following document context, a first answer to the user's question \
             came out too brief.\n\nContext:\n{context_text}\n\nUser Question: {question}\n\n\
             Brief answer:\n{brief}\n\nRewrite the answer in more detail, still grounded only \
             in the provided context. Keep every claim traceable to the context."
        );

        match self.completer.complete(&prompt, params).await {
            Ok(expanded) => expanded,
            Err(e) => {
                tracing::warn!("expansion pass failed: {e}; returning brief answer");
                format!("{brief}\n\n{INCOMPLETE_NOTE}")
            }
        }
    }
}

/// Format retrieved chunks as `Source/Page/Content` blocks, emphasizing
/// math spans and labeled statements to bias the model's attention.
fn format_context(context: &[ContextHit]) -> String {
    context
        .iter()
        .map(|hit| {
            let content = emphasize(&truncate_chars(&hit.content, CONTEXT_CONTENT_CHARS));
            format!(
                "Source: {}, Page: {}\nContent: {}...",
                hit.source, hit.page, content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Wrap detected math spans and definition/theorem labels in `**`.
fn emphasize(text: &str) -> String {
    let with_math = MATH_SPAN.replace_all(text, "**$0**");
    LABELED_STATEMENT
        .replace_all(&with_math, "**$1**")
        .into_owned()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn compose_prompt(class: QueryClass, question: &str, context_text: &str) -> String {
    let guidance = match class {
        QueryClass::Technical => {
            "Preserve all mathematical notation exactly as it appears, define every symbol \
             you use, and state results precisely."
        }
        QueryClass::Complex => {
            "Structure the answer as an explicit comparison: address each aspect in turn \
             and make the tradeoffs clear."
        }
        QueryClass::Standard => "Please provide a concise and accurate answer.",
    };

    format!(
        "Based on the following document context, answer the user's question.\n\n\
         Context:\n{context_text}\n\nUser Question: {question}\n\n\
         {guidance} Base the answer only on the provided context.\n\
         If the answer cannot be found in the context, say \"I cannot find this \
         information in the provided documents.\""
    )
}

/// An answer is too brief when its word count is under
/// `max(100, 3 × question words)`, it trails off with an ellipsis or
/// "etc.", or it has fewer than three sentences.
fn is_too_brief(answer: &str, question: &str) -> bool {
    let words = answer.split_whitespace().count();
    let question_words = question.split_whitespace().count();
    if words < 100.max(3 * question_words) {
        return true;
    }

    let trimmed = answer.trim_end();
    let lower = trimmed.to_lowercase();
    if trimmed.ends_with("...") || trimmed.ends_with('…') || lower.ends_with("etc.") {
        return true;
    }

    sentence_count(answer) < 3
}

fn sentence_count(text: &str) -> usize {
    text.split(['.', '!', '?'])
        .filter(|s| !s.trim().is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted completer: returns canned responses in order, or errors.
    struct ScriptedCompleter {
        responses: Vec<anyhow::Result<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedCompleter {
        fn new(responses: Vec<anyhow::Result<String>>) -> Self {
            Self {
                responses,
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Completer for ScriptedCompleter {
        async fn complete(
            &self,
            _prompt: &str,
            _params: GenerationParams,
        ) -> anyhow::Result<String> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(i) {
                Some(Ok(s)) => Ok(s.clone()),
                Some(Err(e)) => Err(anyhow::anyhow!("{e}")),
                None => panic!("unexpected completion call {i}"),
            }
        }
    }

    fn hit(content: &str) -> ContextHit {
        ContextHit {
            content: content.to_string(),
            source: "paper.pdf".to_string(),
            page: 1,
            score: 0.2,
        }
    }

    fn long_answer() -> String {
        let mut s = String::new();
        for i in 0..40 {
            s.push_str(&format!("Sentence number {i} carries some detail. "));
        }
        s
    }

    #[tokio::test]
    async fn test_empty_context_skips_completion() {
        let completer = Arc::new(ScriptedCompleter::new(vec![]));
        let engine = AnswerEngine::new(completer.clone());

        let out = engine.answer("What is covered?", &[]).await.unwrap();
        assert_eq!(out, NO_CONTEXT_MESSAGE);
        assert_eq!(completer.call_count(), 0);
    }

    #[tokio::test]
    async fn test_adequate_answer_not_expanded() {
        let completer = Arc::new(ScriptedCompleter::new(vec![Ok(long_answer())]));
        let engine = AnswerEngine::new(completer.clone());

        let out = engine
            .answer("What does the paper claim?", &[hit("the claim")])
            .await
            .unwrap();
        assert!(out.contains("Sentence number 0"));
        assert_eq!(completer.call_count(), 1);
    }

    #[tokio::test]
    async fn test_brief_answer_triggers_expansion() {
        let completer = Arc::new(ScriptedCompleter::new(vec![
            Ok("Too short.".to_string()),
            Ok(long_answer()),
        ]));
        let engine = AnswerEngine::new(completer.clone());

        let out = engine
            .answer("Explain the method", &[hit("method details")])
            .await
            .unwrap();
        assert!(out.contains("Sentence number 0"));
        assert_eq!(completer.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_expansion_returns_annotated_brief_answer() {
        let completer = Arc::new(ScriptedCompleter::new(vec![
            Ok("Short but real.".to_string()),
            Err(anyhow::anyhow!("quota exhausted")),
        ]));
        let engine = AnswerEngine::new(completer);

        let out = engine
            .answer("Explain the method", &[hit("method details")])
            .await
            .unwrap();
        assert!(out.contains("Short but real."));
        assert!(out.contains("may be incomplete"));
    }

    #[tokio::test]
    async fn test_generation_failure_surfaces_cause() {
        let completer = Arc::new(ScriptedCompleter::new(vec![Err(anyhow::anyhow!(
            "transport unreachable"
        ))]));
        let engine = AnswerEngine::new(completer);

        let err = engine
            .answer("Explain the method", &[hit("method details")])
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("completion service error"));
    }

    #[test]
    fn test_brevity_thresholds() {
        // 40 words against a 10-word question: 40 < max(100, 30).
        let forty_words = "word ".repeat(40);
        let ten_word_question = "one two three four five six seven eight nine ten";
        assert!(is_too_brief(&forty_words, ten_word_question));

        // 150 words in 5 sentences passes every check.
        let sentence = format!("{}.", "word ".repeat(30).trim());
        let adequate = vec![sentence; 5].join(" ");
        assert!(!is_too_brief(&adequate, ten_word_question));
    }

    #[test]
    fn test_brevity_trailing_ellipsis_and_sentences() {
        let long_but_trailing = format!("{} ...", "word ".repeat(120).trim());
        assert!(is_too_brief(&long_but_trailing, "short question"));

        let two_sentences = format!("{}. {}.", "word ".repeat(60).trim(), "more ".repeat(60).trim());
        assert!(is_too_brief(&two_sentences, "short question"));
    }

    #[test]
    fn test_context_formatting_and_emphasis() {
        let hits = vec![ContextHit {
            content: "Theorem 1: the loss $L(x)$ is convex.".to_string(),
            source: "paper.pdf".to_string(),
            page: 2,
            score: 0.1,
        }];
        let formatted = format_context(&hits);
        assert!(formatted.contains("Source: paper.pdf, Page: 2"));
        assert!(formatted.contains("**$L(x)$**"));
        assert!(formatted.contains("**Theorem 1:**"));
    }

    #[test]
    fn test_prompt_guidance_tracks_classification() {
        let technical = compose_prompt(QueryClass::Technical, "q", "ctx");
        assert!(technical.contains("mathematical notation"));
        let complex = compose_prompt(QueryClass::Complex, "q", "ctx");
        assert!(complex.contains("comparison"));
        let standard = compose_prompt(QueryClass::Standard, "q", "ctx");
        assert!(standard.contains("concise"));
    }
}
