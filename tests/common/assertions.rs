//! Custom assertions for anonymization testing.
//!
//! Provides domain-specific assertions that make tests more readable
//! and provide better error messages.

use super::pdf_helpers::extract_text_from_bytes;

/// Asserts that none of `patterns` survives in the text layer of a PDF.
///
/// # Panics
/// Panics listing every pattern still found.
pub fn assert_all_redacted(pdf: &[u8], patterns: &[&str]) {
    let text = extract_text_or_panic(pdf);
    let found: Vec<&str> = patterns
        .iter()
        .copied()
        .filter(|p| text.contains(p))
        .collect();
    assert!(
        found.is_empty(),
        "The following patterns should be redacted but were found: {:?}\nExtracted text length: {} chars",
        found,
        text.len()
    );
}

/// Asserts that a pattern has been preserved (not redacted) in a PDF.
///
/// # Panics
/// Panics if the pattern is not found.
pub fn assert_preserved(pdf: &[u8], pattern: &str) {
    let text = extract_text_or_panic(pdf);
    assert!(
        text.contains(pattern),
        "Pattern '{}' should be preserved but was not found in:\n{}",
        pattern,
        text
    );
}

/// Asserts that a structured output no longer contains any of `values`.
pub fn assert_text_redacted(text: &str, values: &[&str]) {
    let found: Vec<&str> = values.iter().copied().filter(|v| text.contains(v)).collect();
    assert!(
        found.is_empty(),
        "Values should be anonymized but were found: {:?}",
        found
    );
}

/// Asserts that `value` is a lowercase hex digest of `len` chars.
pub fn assert_hex_digest(value: &str, len: usize) {
    assert_eq!(value.len(), len, "'{}' should be {} chars long", value, len);
    assert!(
        value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()),
        "'{}' should be lowercase hex",
        value
    );
}

fn extract_text_or_panic(pdf: &[u8]) -> String {
    extract_text_from_bytes(pdf)
        .unwrap_or_else(|e| panic!("Failed to extract text from PDF: {}", e))
}
