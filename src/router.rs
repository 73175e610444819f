//! Format routing.
//!
//! The extension picks the family; the content decides the rest. Plain-text
//! exports are told apart by their first line (`S10.G00.00.001,...` is a
//! declaration, anything else a ledger), and PDFs by whether MuPDF finds a
//! text layer on any page.

use crate::domain::{Document, DocumentFormat};
use crate::error::{AnonymizerError, AnonymizerResult};
use crate::redaction::SecureRedactionStrategy;
use crate::structured::DeclarationAnonymizer;
use std::fmt;
use tracing::debug;

/// Branch chosen for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Ledger or declaration rewrite
    Structured(DocumentFormat),
    /// PDF redaction, through OCR first when there is no text layer
    Pdf { has_text: bool },
    Word,
}

impl Route {
    pub fn format(&self) -> DocumentFormat {
        match self {
            Self::Structured(format) => *format,
            Self::Pdf { has_text: true } => DocumentFormat::PdfWithText,
            Self::Pdf { has_text: false } => DocumentFormat::PdfScanned,
            Self::Word => DocumentFormat::WordDoc,
        }
    }

    pub fn needs_ocr(&self) -> bool {
        matches!(self, Self::Pdf { has_text: false })
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.format().fmt(f)
    }
}

/// Picks the branch of the pipeline for each document.
#[derive(Debug, Clone, Default)]
pub struct FormatRouter {
    probe: SecureRedactionStrategy,
}

impl FormatRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, document: &Document) -> AnonymizerResult<Route> {
        let extension = document.extension();
        let route = match extension.as_deref() {
            Some("pdf") => {
                if !document.bytes().starts_with(b"%PDF") {
                    return Err(unsupported(document, extension));
                }
                Route::Pdf {
                    has_text: self.has_text_layer(document)?,
                }
            }
            Some("docx") => {
                if !document.bytes().starts_with(b"PK") {
                    return Err(unsupported(document, extension));
                }
                Route::Word
            }
            Some("dsn") => Route::Structured(DocumentFormat::FixedCodeDeclaration),
            Some("txt") | Some("csv") | Some("tsv") => Route::Structured(sniff_text(document)),
            _ => return Err(unsupported(document, extension)),
        };
        debug!(name = document.name(), route = %route, "Document routed");
        Ok(route)
    }

    fn has_text_layer(&self, document: &Document) -> AnonymizerResult<bool> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("probe.pdf");
        std::fs::write(&path, document.bytes()).map_err(|e| AnonymizerError::Io {
            path: path.clone(),
            source: e,
        })?;
        self.probe.has_text_layer(&path)
    }
}

/// Declaration when the first non-empty line is a `code,value` line.
fn sniff_text(document: &Document) -> DocumentFormat {
    let text = document.text();
    match text.lines().find(|l| !l.trim().is_empty()) {
        Some(line) if DeclarationAnonymizer::is_declaration_line(line) => {
            DocumentFormat::FixedCodeDeclaration
        }
        _ => DocumentFormat::TabularLedger,
    }
}

fn unsupported(document: &Document, extension: Option<String>) -> AnonymizerError {
    AnonymizerError::UnsupportedFormat {
        name: document.name().to_string(),
        extension,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCategory;

    #[test]
    fn test_text_exports_are_sniffed() {
        let router = FormatRouter::new();
        let dsn = Document::new(
            "DSN_202401.txt",
            b"S10.G00.00.001,'Logiciel paie'\nS21.G00.30.001,'185057800608491'\n".to_vec(),
        );
        assert_eq!(
            router.route(&dsn).unwrap(),
            Route::Structured(DocumentFormat::FixedCodeDeclaration)
        );

        let fec = Document::new(
            "123456789FEC20231231.txt",
            b"JournalCode|CompteNum|CompteLib\nVE|411000|Clients\n".to_vec(),
        );
        assert_eq!(
            router.route(&fec).unwrap().format(),
            DocumentFormat::TabularLedger
        );
    }

    #[test]
    fn test_unknown_extensions_are_rejected() {
        let router = FormatRouter::new();
        for name in ["photo.png", "contrat.doc", "README"] {
            let err = router.route(&Document::new(name, b"data".to_vec())).unwrap_err();
            assert_eq!(err.category(), FailureCategory::Format);
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn test_content_must_match_extension() {
        let router = FormatRouter::new();
        let fake_pdf = Document::new("bulletin.pdf", b"not a pdf".to_vec());
        assert!(matches!(
            router.route(&fake_pdf),
            Err(AnonymizerError::UnsupportedFormat { .. })
        ));
        let fake_docx = Document::new("lettre.docx", b"{\\rtf1".to_vec());
        assert!(router.route(&fake_docx).is_err());
    }

    #[test]
    fn test_word_route() {
        let doc = Document::new("Lettre.DOCX", b"PK\x03\x04".to_vec());
        let route = FormatRouter::new().route(&doc).unwrap();
        assert_eq!(route, Route::Word);
        assert!(!route.needs_ocr());
    }
}
