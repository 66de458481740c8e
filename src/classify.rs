//! Query classification.
//!
//! A question is categorized by lexical inspection alone — no model call.
//! The category selects the prompt template and completion parameters:
//! technical questions get the lowest temperature and the largest output
//! budget, trading creativity for precision on formula-bearing answers.

use std::collections::HashSet;

/// Mathematics/statistics vocabulary. Any hit wins over the other classes.
const TECHNICAL_VOCAB: &[&str] = &[
    "derivative",
    "integral",
    "matrix",
    "eigenvalue",
    "theorem",
    "lemma",
    "proof",
    "equation",
    "formula",
    "probability",
    "distribution",
    "variance",
    "covariance",
    "gradient",
    "divergence",
    "bregman",
    "convex",
    "entropy",
    "regression",
    "optimization",
    "loss function",
    "statistical",
    "mathematical",
];

/// Comparison/analysis verbs marking a multi-part analytical question.
const COMPLEX_VOCAB: &[&str] = &[
    "compare",
    "contrast",
    "evaluate",
    "analyze",
    "analyse",
    "difference",
    "differences",
    "advantages",
    "disadvantages",
    "tradeoff",
    "trade-off",
    "versus",
    "relationship",
    "implications",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryClass {
    Standard,
    Technical,
    Complex,
}

/// Completion parameters selected by a classification.
#[derive(Debug, Clone, Copy)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl QueryClass {
    pub fn params(&self) -> GenerationParams {
        match self {
            QueryClass::Technical => GenerationParams {
                temperature: 0.1,
                max_tokens: 1200,
            },
            QueryClass::Complex => GenerationParams {
                temperature: 0.2,
                max_tokens: 800,
            },
            QueryClass::Standard => GenerationParams {
                temperature: 0.3,
                max_tokens: 500,
            },
        }
    }
}

/// Classify a question. Checked in order technical > complex > standard,
/// which also resolves ties.
pub fn classify(question: &str) -> QueryClass {
    let lower = question.to_lowercase();
    let words: HashSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric() && c != '-')
        .filter(|w| !w.is_empty())
        .collect();

    if TECHNICAL_VOCAB.iter().any(|t| matches_term(&lower, &words, t)) {
        return QueryClass::Technical;
    }
    if COMPLEX_VOCAB.iter().any(|t| matches_term(&lower, &words, t)) {
        return QueryClass::Complex;
    }
    QueryClass::Standard
}

/// Single-word terms must match a whole word; multi-word terms match as
/// phrases. Whole-word matching keeps short verbs from firing inside
/// longer words.
fn matches_term(lower: &str, words: &HashSet<&str>, term: &str) -> bool {
    if term.contains(' ') {
        lower.contains(term)
    } else {
        words.contains(term)
    }
}
