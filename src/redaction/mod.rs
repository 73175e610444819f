//! Redaction strategies and implementations.
//!
//! This module provides a strategy pattern for the document families that
//! carry free text (PDF and word-processor files). The service extracts
//! spans, picks the document type, classifies every span and turns each
//! surviving entity into exactly one [`RedactionOp`] before the strategy
//! applies them.

pub mod insert;
pub mod secure;
pub mod signature;
pub mod strategy;
pub mod word;

pub use insert::InsertionStyle;
pub use secure::SecureRedactionStrategy;
pub use signature::{
    CommandSignatureDetector, Detection, NullSignatureDetector, SignatureDetector,
    SignatureMasker, SignatureOutcome,
};
pub use strategy::{join_spans, RedactionResult, RedactionStrategy};
pub use word::WordRedactionStrategy;

use crate::classifier::{DocumentType, DocumentTypeClassifier, EntityClassifier, ReplacementRegistry};
use crate::domain::{RedactionOp, TextSpan};
use crate::error::{AnonymizerError, AnonymizerResult};
use std::path::Path;
use tracing::{debug, info};

/// Spans, document type and planned operations of one document.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub document_type: DocumentType,
    /// Extracted spans with their classified entities attached
    pub spans: Vec<TextSpan>,
    pub operations: Vec<RedactionOp>,
}

impl Analysis {
    pub fn text(&self) -> String {
        join_spans(&self.spans)
    }
}

/// Redacted document and what was done to it.
#[derive(Debug, Clone)]
pub struct RedactionOutcome {
    pub bytes: Vec<u8>,
    pub document_type: DocumentType,
    pub operations: Vec<RedactionOp>,
    pub result: RedactionResult,
}

/// Classifies every span and plans one operation per surviving entity.
pub fn plan_operations(
    spans: &mut [TextSpan],
    document_type: DocumentType,
    classifier: &EntityClassifier,
    registry: &ReplacementRegistry,
) -> Vec<RedactionOp> {
    let mut ops = Vec::new();
    for (index, span) in spans.iter_mut().enumerate() {
        span.entities = classifier.classify_span(span, document_type);
        for entity in span.redacted_entities() {
            let mut target = span.sub_box(entity.range.clone());
            if target.is_empty() {
                target = span.bbox;
            }
            ops.push(RedactionOp {
                page: span.page,
                span_index: index,
                range: entity.range.clone(),
                target,
                replacement: registry.replacement(document_type, entity.category, &entity.text),
                font_size: span.font_size,
                category: entity.category,
            });
        }
    }
    ops
}

/// Redaction service coordinating strategy execution.
///
/// This service provides a high-level API for redacting documents
/// using different strategies while handling common concerns like
/// classification, replacement planning and error handling.
pub struct RedactionService {
    strategy: Box<dyn RedactionStrategy>,
    registry: ReplacementRegistry,
    type_classifier: DocumentTypeClassifier,
}

impl RedactionService {
    /// Creates a new redaction service with the specified strategy.
    pub fn new(strategy: Box<dyn RedactionStrategy>) -> Self {
        Self {
            strategy,
            registry: ReplacementRegistry::default(),
            type_classifier: DocumentTypeClassifier::new(),
        }
    }

    /// Creates a service with secure (physical removal) PDF redaction.
    pub fn with_secure_strategy() -> Self {
        Self::new(Box::new(SecureRedactionStrategy::default()))
    }

    /// Creates a service for word-processor documents.
    pub fn with_word_strategy() -> Self {
        Self::new(Box::new(WordRedactionStrategy::new()))
    }

    pub fn with_registry(mut self, registry: ReplacementRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Extracts and classifies a document on disk without modifying it.
    pub fn analyze_path(
        &self,
        input: &Path,
        classifier: &EntityClassifier,
    ) -> AnonymizerResult<Analysis> {
        if !input.exists() {
            return Err(AnonymizerError::Io {
                path: input.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "Input file does not exist",
                ),
            });
        }

        let mut spans = self.strategy.extract_spans(input)?;
        let document_type = self.type_classifier.classify(&join_spans(&spans));
        let operations = plan_operations(&mut spans, document_type, classifier, &self.registry);
        debug!(
            strategy = self.strategy.name(),
            %document_type,
            spans = spans.len(),
            operations = operations.len(),
            "Document analyzed"
        );
        Ok(Analysis {
            document_type,
            spans,
            operations,
        })
    }

    pub fn analyze(&self, bytes: &[u8], classifier: &EntityClassifier) -> AnonymizerResult<Analysis> {
        let dir = tempfile::tempdir()?;
        let input = self.stage(dir.path(), bytes)?;
        self.analyze_path(&input, classifier)
    }

    /// Redacts a document held in memory.
    ///
    /// Fails rather than returning a partially redacted document when the
    /// strategy could not apply every planned operation.
    pub fn redact(
        &self,
        bytes: &[u8],
        classifier: &EntityClassifier,
    ) -> AnonymizerResult<RedactionOutcome> {
        let dir = tempfile::tempdir()?;
        let input = self.stage(dir.path(), bytes)?;
        let analysis = self.analyze_path(&input, classifier)?;

        if analysis.operations.is_empty() && !self.strategy.rewrites_metadata() {
            info!(document_type = %analysis.document_type, "Nothing to redact");
            return Ok(RedactionOutcome {
                bytes: bytes.to_vec(),
                document_type: analysis.document_type,
                operations: analysis.operations,
                result: RedactionResult::none(),
            });
        }

        let output = dir
            .path()
            .join(format!("output.{}", self.strategy.extension()));
        let result = self.strategy.apply(&input, &output, &analysis.operations)?;
        if result.instances_redacted != analysis.operations.len() {
            return Err(AnonymizerError::PdfProcessing {
                message: format!(
                    "{} of {} redactions applied",
                    result.instances_redacted,
                    analysis.operations.len()
                ),
                page: None,
                source: None,
            });
        }

        let bytes = std::fs::read(&output).map_err(|e| AnonymizerError::Io {
            path: output.clone(),
            source: e,
        })?;
        info!(
            document_type = %analysis.document_type,
            redactions = result.instances_redacted,
            pages_modified = result.pages_modified,
            "Document redacted"
        );
        Ok(RedactionOutcome {
            bytes,
            document_type: analysis.document_type,
            operations: analysis.operations,
            result,
        })
    }

    /// Extracts text from a document for analysis.
    pub fn extract_text(&self, input: &Path) -> AnonymizerResult<String> {
        self.strategy.extract_text(input)
    }

    fn stage(&self, dir: &Path, bytes: &[u8]) -> AnonymizerResult<std::path::PathBuf> {
        let input = dir.join(format!("input.{}", self.strategy.extension()));
        std::fs::write(&input, bytes).map_err(|e| AnonymizerError::Io {
            path: input.clone(),
            source: e,
        })?;
        Ok(input)
    }
}

impl std::fmt::Debug for RedactionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedactionService")
            .field("strategy", &self.strategy.name())
            .finish()
    }
}

/// Extracts the text layer of a PDF with `pdf-extract`.
///
/// Independent from MuPDF, which makes it suitable for checking what a
/// redacted file still exposes.
pub fn extract_text_from_pdf(path: &Path) -> AnonymizerResult<String> {
    let bytes = std::fs::read(path).map_err(|e| AnonymizerError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    pdf_extract::extract_text_from_mem(&bytes).map_err(|e| AnonymizerError::TextExtraction {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
