//! Per-page text extraction for ingested documents.
//!
//! The extraction collaborator: given a file path, return the ordered
//! `(page_number, page_text)` sequence. PDF extraction goes through
//! `pdf-extract`; plain-text and Markdown files are accepted with pages
//! split on form-feed characters, which keeps fixtures and scripted
//! ingestion simple. Unreadable or unsupported files surface as ingestion
//! errors.

use std::path::Path;

use crate::errors::PipelineError;

/// Extract the ordered page sequence from a document file.
///
/// Page numbers are 1-based. Pages that are entirely empty are kept in the
/// sequence (the chunker skips empty lines); a document with no extractable
/// text yields pages whose chunking produces zero chunks, which is not an
/// error.
pub fn extract_pages(path: &Path) -> Result<Vec<(u32, String)>, PipelineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "pdf" => extract_pdf(path),
        "txt" | "md" => extract_text_file(path),
        other => Err(PipelineError::Ingestion {
            path: path.display().to_string(),
            reason: format!("unsupported file type: .{other}"),
        }),
    }
}

fn extract_pdf(path: &Path) -> Result<Vec<(u32, String)>, PipelineError> {
    let pages = pdf_extract::extract_text_by_pages(path).map_err(|e| PipelineError::Ingestion {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(number_pages(pages))
}

/// Plain text: form feeds delimit pages; a file without form feeds is one
/// page.
fn extract_text_file(path: &Path) -> Result<Vec<(u32, String)>, PipelineError> {
    let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Ingestion {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let pages: Vec<String> = content.split('\u{c}').map(|p| p.to_string()).collect();
    Ok(number_pages(pages))
}

fn number_pages(pages: Vec<String>) -> Vec<(u32, String)> {
    pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| (i as u32 + 1, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_file_pages_split_on_form_feed() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.txt");
        std::fs::write(&path, "page one\u{c}page two\u{c}page three").unwrap();

        let pages = extract_pages(&path).unwrap();
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], (1, "page one".to_string()));
        assert_eq!(pages[2], (3, "page three".to_string()));
    }

    #[test]
    fn test_text_file_without_form_feed_is_one_page() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.md");
        std::fs::write(&path, "only page").unwrap();

        let pages = extract_pages(&path).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_unsupported_extension_is_ingestion_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("doc.docx");
        std::fs::write(&path, "irrelevant").unwrap();

        let err = extract_pages(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion { .. }));
    }

    #[test]
    fn test_missing_file_is_ingestion_error() {
        let err = extract_pages(Path::new("/nonexistent/file.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion { .. }));
    }

    #[test]
    fn test_invalid_pdf_is_ingestion_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        std::fs::write(&path, "not a pdf").unwrap();

        let err = extract_pages(&path).unwrap_err();
        assert!(matches!(err, PipelineError::Ingestion { .. }));
    }
}
