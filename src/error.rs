//! Error types for the anonymization pipeline.
//!
//! Every failure carries a [`FailureCategory`] so that batch callers can tell
//! format/validation problems (terminal) from timeouts (retryable) without
//! parsing messages.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Result type alias for anonymization operations.
pub type AnonymizerResult<T> = Result<T, AnonymizerError>;

/// Coarse failure classes surfaced to callers of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Unrecognized or malformed input format
    Format,
    /// Invalid parameters or configuration
    Validation,
    /// A bounded operation (OCR) exceeded its deadline
    Timeout,
    /// Entity or signature detection failed
    Detection,
    /// I/O, PDF backend or OCR engine failure
    Processing,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Validation => "validation",
            Self::Timeout => "timeout",
            Self::Detection => "detection",
            Self::Processing => "processing",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for all anonymization operations.
#[derive(Debug)]
pub enum AnonymizerError {
    /// Error occurred while reading or writing files
    Io { path: PathBuf, source: io::Error },

    /// Error occurred during PDF processing
    PdfProcessing {
        message: String,
        page: Option<usize>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Pattern compilation error (allow-list, lexicon)
    PatternError { pattern: String, reason: String },

    /// Text extraction failed
    TextExtraction { path: PathBuf, reason: String },

    /// Invalid configuration or parameters
    InvalidInput { parameter: String, reason: String },

    /// Backend-specific error (MuPDF, lopdf, zip, ...)
    BackendError {
        backend: String,
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The file extension or content is not one of the handled families
    UnsupportedFormat {
        name: String,
        extension: Option<String>,
    },

    /// A structured file (ledger export, declaration) cannot be processed
    StructuredFormat { format: String, reason: String },

    /// OCR did not finish before its deadline
    OcrTimeout { after: Duration },

    /// OCR engine reported a failure
    OcrFailure { reason: String },

    /// A detector failed in a way that prevents safe output
    Detection { stage: String, reason: String },
}

impl AnonymizerError {
    /// Returns the failure class of this error.
    pub fn category(&self) -> FailureCategory {
        match self {
            Self::UnsupportedFormat { .. } | Self::StructuredFormat { .. } => {
                FailureCategory::Format
            }
            Self::InvalidInput { .. } | Self::PatternError { .. } => FailureCategory::Validation,
            Self::OcrTimeout { .. } => FailureCategory::Timeout,
            Self::Detection { .. } => FailureCategory::Detection,
            Self::Io { .. }
            | Self::PdfProcessing { .. }
            | Self::TextExtraction { .. }
            | Self::BackendError { .. }
            | Self::OcrFailure { .. } => FailureCategory::Processing,
        }
    }

    /// Timeouts may succeed on a later attempt; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        self.category() == FailureCategory::Timeout
    }

    pub(crate) fn mupdf(message: impl Into<String>, source: mupdf::Error) -> Self {
        Self::BackendError {
            backend: "MuPDF".to_string(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub(crate) fn lopdf(message: impl Into<String>, source: lopdf::Error) -> Self {
        Self::BackendError {
            backend: "lopdf".to_string(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

impl fmt::Display for AnonymizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "IO error for path '{}': {}", path.display(), source)
            }
            Self::PdfProcessing { message, page, .. } => {
                if let Some(p) = page {
                    write!(f, "PDF processing error on page {}: {}", p, message)
                } else {
                    write!(f, "PDF processing error: {}", message)
                }
            }
            Self::PatternError { pattern, reason } => {
                write!(f, "Pattern error for '{}': {}", pattern, reason)
            }
            Self::TextExtraction { path, reason } => {
                write!(
                    f,
                    "Text extraction failed for '{}': {}",
                    path.display(),
                    reason
                )
            }
            Self::InvalidInput { parameter, reason } => {
                write!(f, "Invalid input for '{}': {}", parameter, reason)
            }
            Self::BackendError {
                backend, message, ..
            } => {
                write!(f, "{} backend error: {}", backend, message)
            }
            Self::UnsupportedFormat { name, extension } => match extension {
                Some(ext) => write!(f, "Unsupported format '.{}' for '{}'", ext, name),
                None => write!(f, "Unsupported format for '{}' (no extension)", name),
            },
            Self::StructuredFormat { format, reason } => {
                write!(f, "Invalid {} file: {}", format, reason)
            }
            Self::OcrTimeout { after } => {
                write!(f, "OCR timed out after {} s", after.as_secs())
            }
            Self::OcrFailure { reason } => write!(f, "OCR failed: {}", reason),
            Self::Detection { stage, reason } => {
                write!(f, "Detection failed during {}: {}", stage, reason)
            }
        }
    }
}

impl std::error::Error for AnonymizerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::PdfProcessing { source, .. } | Self::BackendError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for AnonymizerError {
    fn from(err: io::Error) -> Self {
        Self::BackendError {
            backend: "std::io".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<zip::result::ZipError> for AnonymizerError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::BackendError {
            backend: "zip".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<crate::classifier::DetectionError> for AnonymizerError {
    fn from(err: crate::classifier::DetectionError) -> Self {
        Self::Detection {
            stage: "entity model".to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnonymizerError::UnsupportedFormat {
            name: "photo.png".to_string(),
            extension: Some("png".to_string()),
        };
        assert_eq!(err.to_string(), "Unsupported format '.png' for 'photo.png'");
    }

    #[test]
    fn test_only_timeouts_are_retryable() {
        let timeout = AnonymizerError::OcrTimeout {
            after: Duration::from_secs(300),
        };
        assert!(timeout.is_retryable());
        assert_eq!(timeout.category(), FailureCategory::Timeout);

        let failure = AnonymizerError::OcrFailure {
            reason: "exit status 2".to_string(),
        };
        assert!(!failure.is_retryable());
        assert_eq!(failure.category(), FailureCategory::Processing);
    }
}
