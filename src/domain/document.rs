//! Input and output documents.

use crate::classifier::DocumentType;
use crate::error::{AnonymizerError, AnonymizerResult};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Sniffed format of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentFormat {
    /// Pipe or tab separated ledger export (FEC)
    TabularLedger,
    /// `code,value` payroll declaration lines (DSN)
    FixedCodeDeclaration,
    PdfWithText,
    /// PDF without any extractable text layer
    PdfScanned,
    /// Office Open XML word-processor document
    WordDoc,
}

impl DocumentFormat {
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::TabularLedger | Self::FixedCodeDeclaration)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TabularLedger => "tabular ledger",
            Self::FixedCodeDeclaration => "fixed-code declaration",
            Self::PdfWithText => "PDF (text)",
            Self::PdfScanned => "PDF (scanned)",
            Self::WordDoc => "word document",
        };
        f.write_str(name)
    }
}

/// Raw input document. Read-only for every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    bytes: Vec<u8>,
}

impl Document {
    /// Creates a document from a file name (used for the extension and the
    /// output name) and its content.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> AnonymizerResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| AnonymizerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Lower-cased extension of the file name, without the dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }

    /// Character encoding of a text document.
    pub fn encoding(&self) -> TextEncoding {
        match std::str::from_utf8(&self.bytes) {
            Ok(s) => TextEncoding::Utf8 {
                bom: s.starts_with('\u{feff}'),
            },
            Err(_) => TextEncoding::Latin1,
        }
    }

    /// Content decoded as UTF-8, falling back to Latin-1 for legacy exports.
    pub fn text(&self) -> String {
        match std::str::from_utf8(&self.bytes) {
            Ok(s) => s.trim_start_matches('\u{feff}').to_string(),
            Err(_) => self.bytes.iter().map(|&b| b as char).collect(),
        }
    }
}

/// Encoding of a structured export, kept so that the anonymized file is
/// written back the way it was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8 { bom: bool },
    /// ISO-8859-1, common in older accounting exports
    Latin1,
}

impl TextEncoding {
    /// Encodes `text`; chars outside Latin-1 become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 { bom: false } => text.as_bytes().to_vec(),
            Self::Utf8 { bom: true } => {
                let mut bytes = "\u{feff}".as_bytes().to_vec();
                bytes.extend_from_slice(text.as_bytes());
                bytes
            }
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
        }
    }
}

/// Result of anonymizing one document.
#[derive(Debug, Clone)]
pub struct AnonymizedDocument {
    /// Output file name, derived from the source name
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub format: DocumentFormat,
    /// Ruleset used for free-text documents
    pub document_type: Option<DocumentType>,
    /// Number of redaction operations or rewritten structured fields
    pub redaction_count: usize,
    /// True when signature masking rebuilt the PDF from page images
    pub image_backed: bool,
}

impl AnonymizedDocument {
    /// Output name: `prefix` + source basename.
    pub fn output_name(prefix: &str, source_name: &str) -> String {
        let base = Path::new(source_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source_name.to_string());
        format!("{}{}", prefix, base)
    }

    /// Writes the artifact under `dir` and returns its path.
    pub fn write_to(&self, dir: &Path) -> AnonymizerResult<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|e| AnonymizerError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes).map_err(|e| AnonymizerError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }
}
