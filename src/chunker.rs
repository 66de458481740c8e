//! Technical-content-aware text chunker.
//!
//! Splits per-page extracted text into [`Chunk`]s. Lines are accumulated
//! into a pending buffer; a technical line (math notation or academic
//! vocabulary) closes the prior chunk and starts a new one so that formal
//! statements are not split mid-statement, and a non-technical line that
//! would push the buffer past `max_chars` also forces a flush. Buffering
//! favors semantic coherence over strict length: mathematical content loses
//! meaning if split arbitrarily.
//!
//! Chunks never span pages. Empty lines are skipped and do not count toward
//! size. Each chunk's `is_technical` flag is re-evaluated over its full
//! joined content.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::Chunk;

/// Academic/technical vocabulary that marks a line as technical.
const TECHNICAL_TERMS: &[&str] = &[
    "definition",
    "theorem",
    "lemma",
    "proof",
    "corollary",
    "proposition",
    "axiom",
    "algorithm",
    "equation",
    "formula",
    "derivation",
    "notation",
];

/// Mathematical-notation patterns: inline/display formula delimiters and
/// formula-environment markers.
static MATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\$[^$]+\$",
        r"\$\$",
        r"\\\(",
        r"\\\[",
        r"\\begin\{(equation|align|gather|theorem|lemma|proof|matrix)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static chunker pattern"))
    .collect()
});

/// Returns true if the text matches the technical-content rule table:
/// either a math-notation pattern or a technical vocabulary term.
pub fn is_technical_text(text: &str) -> bool {
    if MATH_PATTERNS.iter().any(|re| re.is_match(text)) {
        return true;
    }
    let lower = text.to_lowercase();
    TECHNICAL_TERMS.iter().any(|term| lower.contains(term))
}

/// Split per-page text into chunks for one source document.
///
/// `pages` is the ordered `(page_number, page_text)` sequence from text
/// extraction. A document with no content after empty-line filtering yields
/// zero chunks without error.
pub fn chunk_pages(source: &str, pages: &[(u32, String)], max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for (page, text) in pages {
        let mut buf = String::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if is_technical_text(line) {
                // Close the prior chunk so the technical passage starts a
                // fresh one, whatever the buffer's current size.
                flush(&mut chunks, &mut buf, source, *page);
                buf.push_str(line);
                flush_if_over(&mut chunks, &mut buf, source, *page, max_chars);
                continue;
            }

            if line.len() > max_chars {
                // Oversized plain line: flush and hard-split at whitespace
                // so only technical lines may exceed the threshold.
                flush(&mut chunks, &mut buf, source, *page);
                for piece in split_long_line(line, max_chars) {
                    chunks.push(make_chunk(source, *page, piece));
                }
                continue;
            }

            if !buf.is_empty() && buf.len() + 1 + line.len() > max_chars {
                flush(&mut chunks, &mut buf, source, *page);
            }

            if !buf.is_empty() {
                buf.push('\n');
            }
            buf.push_str(line);
        }

        flush(&mut chunks, &mut buf, source, *page);
    }

    chunks
}

fn flush(chunks: &mut Vec<Chunk>, buf: &mut String, source: &str, page: u32) {
    if buf.is_empty() {
        return;
    }
    chunks.push(make_chunk(source, page, std::mem::take(buf)));
}

/// Flush the buffer only when it already exceeds the size threshold.
/// Used right after a technical line is admitted: a technical line longer
/// than `max_chars` stays whole, but it must not keep accumulating.
fn flush_if_over(
    chunks: &mut Vec<Chunk>,
    buf: &mut String,
    source: &str,
    page: u32,
    max_chars: usize,
) {
    if buf.len() >= max_chars {
        flush(chunks, buf, source, page);
    }
}

fn make_chunk(source: &str, page: u32, content: String) -> Chunk {
    let is_technical = is_technical_text(&content);
    Chunk {
        content,
        page,
        source: source.to_string(),
        is_technical,
    }
}

/// Hard-split an oversized line at whitespace boundaries, keeping each
/// piece within `max_chars` where possible.
fn split_long_line(line: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in line.split_whitespace() {
        if !current.is_empty() && current.len() + 1 + word.len() > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}
