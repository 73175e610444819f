//! PDF inspection helpers.

use anyhow::Result;
use std::path::Path;
use std::sync::Mutex;

/// Serializes MuPDF use across the tests of one binary; MuPDF's font
/// initialization is not thread-safe.
pub static MUPDF_LOCK: Mutex<()> = Mutex::new(());

/// Runs `$body` while holding [`MUPDF_LOCK`].
#[macro_export]
macro_rules! with_mupdf_lock {
    ($body:expr) => {{
        let _guard = $crate::common::MUPDF_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        $body
    }};
}

/// Extracts text from a PDF with `pdf-extract`, independently from MuPDF.
pub fn extract_text(pdf_path: &Path) -> Result<String> {
    anonymiseur::extract_text_from_pdf(pdf_path)
        .map_err(|e| anyhow::anyhow!("Failed to extract text: {}", e))
}

/// Same as [`extract_text`] for in-memory bytes.
pub fn extract_text_from_bytes(pdf: &[u8]) -> Result<String> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("check.pdf");
    std::fs::write(&path, pdf)?;
    extract_text(&path)
}

/// Counts occurrences of a pattern in a PDF.
pub fn count_pattern_in_pdf(pdf_path: &Path, pattern: &str) -> Result<usize> {
    let text = extract_text(pdf_path)?;
    Ok(text.matches(pattern).count())
}

/// Validates that a PDF is loadable and has basic structure.
pub fn is_valid_pdf(pdf: &[u8]) -> bool {
    ::lopdf::Document::load_mem(pdf).is_ok()
}

/// Number of pages of a PDF.
pub fn page_count(pdf: &[u8]) -> Result<usize> {
    Ok(::lopdf::Document::load_mem(pdf)?.get_pages().len())
}
