//! Layout-preserving anonymization of French accounting and HR documents.
//!
//! The library rewrites ledger exports (FEC) and payroll declarations (DSN)
//! field by field, and redacts free-text documents (PDF and `.docx`) in
//! place: sensitive text is physically removed with MuPDF's redaction API
//! and a replacement is written back at the same position.
//!
//! # Features
//!
//! - **Structured exports**: account masking, sequential pseudonyms, salted hashes, age buckets
//! - **Hybrid detection**: regex rules per document type plus a pluggable entity model
//! - **Suppression**: allow-list, amounts and shape checks keep false positives out
//! - **Secure Redaction**: text is removed from the content streams, not hidden
//! - **OCR fallback**: scanned PDFs go through `ocrmypdf` under a hard timeout
//! - **Signature masking**: contracts can be rebuilt from masked page images
//!
//! # Architecture
//!
//! - [`router`]: picks the pipeline branch from extension and content
//! - [`structured`]: ledger and declaration rewrites
//! - [`classifier`]: document type and PII entity classification
//! - [`redaction`]: redaction strategies and service layer
//! - [`ocr`]: timeout-bounded OCR worker
//! - [`pipeline`]: the [`Anonymizer`] tying everything together
//! - [`error`]: error type and failure categories
//!
//! # Quick Start
//!
//! ```no_run
//! use anonymiseur::{Anonymizer, Document};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let anonymizer = Anonymizer::new();
//! let mut run = anonymizer.new_run();
//!
//! let document = Document::from_path(Path::new("bulletin_janvier.pdf"))?;
//! let anonymized = anonymizer.anonymize(&document, &mut run)?;
//! anonymized.write_to(Path::new("out"))?;
//! # Ok(())
//! # }
//! ```
//!
//! # Examples
//!
//! ## Ledger export
//!
//! ```
//! use anonymiseur::structured::{LedgerAnonymizer, RunState};
//!
//! let fec = "CompteNum|CompAuxLib|EcritureLib\n4011000123|DUPONT SARL|Facture 118\n";
//! let mut run = RunState::new();
//! let out = LedgerAnonymizer::default().anonymize(fec, &mut run).unwrap();
//! assert!(out.text.contains("4011XXXXXX|Client001|"));
//! ```
//!
//! ## Pattern Matching
//!
//! ```
//! use anonymiseur::domain::{NirMatcher, PatternMatcher};
//!
//! let matcher = NirMatcher::new();
//! assert_eq!(matcher.extract_all("N° SS : 1 85 05 78 006 084 91").len(), 1);
//! ```

// Public API
pub mod classifier;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod ocr;
pub mod pipeline;
pub mod redaction;
pub mod router;
pub mod structured;

mod runtime;

// Re-exports for convenient access
pub use classifier::{DocumentType, DocumentTypeClassifier, EntityClassifier};
pub use config::{load_config, AnonymizerConfig};
pub use domain::{
    AccountMaskPolicy, AnonymizedDocument, Document, DocumentFormat, PatternMatcher, PiiCategory,
};
pub use error::{AnonymizerError, AnonymizerResult, FailureCategory};
pub use ocr::{OcrWorker, OcrMyPdfEngine};
pub use pipeline::{Anonymizer, BatchReport, DocumentOutcome, RunScope};
pub use redaction::{
    extract_text_from_pdf, RedactionResult, RedactionService, RedactionStrategy,
    SecureRedactionStrategy, SignatureMasker, WordRedactionStrategy,
};
pub use router::{FormatRouter, Route};
pub use structured::RunState;
