//! Post-hoc response sanitization.
//!
//! [`sanitize`] is pure and total: whatever the completion service returns,
//! it produces a cleaned string and never fails. Stages run in a fixed
//! order — artifact stripping must precede math normalization, because a
//! stripped bracket marker could otherwise consume a legitimate math
//! delimiter.

use regex::Regex;
use std::sync::LazyLock;

/// Model artifacts removed outright: role markers, bracketed instruction
/// markers, and parenthetical stage directions.
static ARTIFACT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<\|[^|>]*\|>",
        r"(?i)\[/?(?:INST|SYS|SYSTEM|USER|ASSISTANT)\]",
        r"(?i)\((?:as an ai[^)]*|end of (?:answer|response)|your answer here)\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static sanitizer pattern"))
    .collect()
});

/// LaTeX macro names substituted with their Unicode glyphs. Ordered so that
/// longer names are replaced before their prefixes (`\infty` before `\int`
/// before `\in`).
const MACRO_GLYPHS: &[(&str, &str)] = &[
    (r"\alpha", "α"),
    (r"\beta", "β"),
    (r"\gamma", "γ"),
    (r"\delta", "δ"),
    (r"\epsilon", "ε"),
    (r"\theta", "θ"),
    (r"\lambda", "λ"),
    (r"\mu", "μ"),
    (r"\sigma", "σ"),
    (r"\phi", "φ"),
    (r"\pi", "π"),
    (r"\omega", "ω"),
    (r"\infty", "∞"),
    (r"\int", "∫"),
    (r"\in", "∈"),
    (r"\sum", "Σ"),
    (r"\prod", "Π"),
    (r"\partial", "∂"),
    (r"\nabla", "∇"),
    (r"\sqrt", "√"),
    (r"\leq", "≤"),
    (r"\geq", "≥"),
    (r"\neq", "≠"),
    (r"\approx", "≈"),
    (r"\times", "×"),
    (r"\cdot", "·"),
    (r"\pm", "±"),
    (r"\rightarrow", "→"),
    (r"\subset", "⊂"),
];

static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,.;:!?])").expect("static sanitizer pattern"));

/// Trailing/leading characters allowed to survive edge trimming, besides
/// alphanumerics.
const CLOSING_PUNCT: &[char] = &['.', '!', '?', ')', ']', '"', '\'', '$'];

/// Clean a model response. Never raises.
pub fn sanitize(text: &str) -> String {
    let stripped = strip_artifacts(text);
    let mathed = normalize_math(&stripped);
    let prose = normalize_prose(&mathed);
    trim_edges(&prose)
}

fn strip_artifacts(text: &str) -> String {
    let mut out = text.to_string();
    for re in ARTIFACT_PATTERNS.iter() {
        out = re.replace_all(&out, "").into_owned();
    }
    out
}

/// Normalize math delimiters to `$..$` / `$$..$$` and substitute macro
/// glyphs.
fn normalize_math(text: &str) -> String {
    let mut out = text
        .replace(r"\[", "$$")
        .replace(r"\]", "$$")
        .replace(r"\(", "$")
        .replace(r"\)", "$");
    for (macro_name, glyph) in MACRO_GLYPHS {
        out = out.replace(macro_name, glyph);
    }
    out
}

fn normalize_prose(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(collapse_repeated_words)
        .collect();
    let joined = lines.join("\n");
    let spaced = SPACE_BEFORE_PUNCT.replace_all(&joined, "$1");
    capitalize_sentences(&spaced)
}

/// Collapse immediately-repeated words ("the the" → "the"),
/// case-insensitively, within one line.
fn collapse_repeated_words(line: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for word in line.split_whitespace() {
        if let Some(prev) = out.last() {
            if prev.eq_ignore_ascii_case(word) {
                continue;
            }
        }
        out.push(word);
    }
    out.join(" ")
}

/// Upper-case the first character of each sentence when it is alphabetic.
/// Sentences are split on `.`, `!` or `?` followed by whitespace; a
/// sentence opening with a digit or symbol (e.g. a formula) is left alone.
fn capitalize_sentences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_sentence_start = true;
    let mut prev_terminal = false;

    for ch in text.chars() {
        if ch.is_whitespace() {
            if prev_terminal {
                at_sentence_start = true;
            }
            out.push(ch);
            continue;
        }
        prev_terminal = matches!(ch, '.' | '!' | '?');
        if at_sentence_start {
            at_sentence_start = false;
            if ch.is_alphabetic() {
                out.extend(ch.to_uppercase());
                continue;
            }
        }
        out.push(ch);
    }
    out
}

fn trim_edges(text: &str) -> String {
    text.trim_matches(|c: char| !c.is_alphanumeric() && !CLOSING_PUNCT.contains(&c))
        .trim()
        .to_string()
}
