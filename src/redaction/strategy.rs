//! Redaction strategy trait and supporting types.
//!
//! A strategy knows one document family: it extracts positioned text spans
//! and applies a list of [`RedactionOp`]s computed from them. Detection and
//! replacement planning happen in the service, so the same plan can be
//! applied to PDFs and word documents alike.

use crate::domain::{RedactionOp, TextSpan};
use crate::error::AnonymizerResult;
use std::path::Path;

/// Statistics about a redaction operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedactionResult {
    /// Number of instances redacted
    pub instances_redacted: usize,

    /// Pages processed
    pub pages_processed: usize,

    /// Pages with redactions
    pub pages_modified: usize,

    /// Whether text was physically removed (vs visually obscured)
    pub secure: bool,
}

impl RedactionResult {
    /// Creates a result indicating no redactions were needed.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if any redactions were applied.
    pub fn has_redactions(&self) -> bool {
        self.instances_redacted > 0
    }
}

/// Strategy for redacting sensitive information from one document family.
pub trait RedactionStrategy: Send + Sync {
    /// Extracts text lines (or paragraphs) with their geometry.
    ///
    /// Spans are returned in reading order; a [`RedactionOp::span_index`]
    /// refers to a position in this list.
    fn extract_spans(&self, input: &Path) -> AnonymizerResult<Vec<TextSpan>>;

    /// Erases the targets of `ops` and re-inserts their replacement text.
    ///
    /// # Arguments
    /// * `input` - Path to the input document
    /// * `output` - Path where the redacted document should be written
    /// * `ops` - One operation per entity to remove
    fn apply(
        &self,
        input: &Path,
        output: &Path,
        ops: &[RedactionOp],
    ) -> AnonymizerResult<RedactionResult>;

    /// True when [`apply`](Self::apply) also cleans document metadata, so
    /// it must run even without operations.
    fn rewrites_metadata(&self) -> bool {
        false
    }

    /// Extracts plain text for inspection.
    fn extract_text(&self, input: &Path) -> AnonymizerResult<String> {
        let spans = self.extract_spans(input)?;
        Ok(join_spans(&spans))
    }

    /// File extension of the documents this strategy handles.
    fn extension(&self) -> &str;

    /// Returns a human-readable name for this strategy.
    fn name(&self) -> &str;

    /// Returns whether this strategy provides secure (physical) deletion.
    fn is_secure(&self) -> bool;
}

/// Full text of a span list, one span per line.
pub fn join_spans(spans: &[TextSpan]) -> String {
    let mut text = String::new();
    for span in spans {
        text.push_str(&span.text);
        text.push('\n');
    }
    text
}
