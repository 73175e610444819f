//! OCR fallback for PDFs without a text layer.
//!
//! The engine runs as an external process on a dedicated current-thread
//! runtime with a hard deadline, also when the caller is itself async. Whatever goes wrong, the worker never
//! returns partially recognized output: only a completed run yields bytes.

pub mod ocrmypdf;

pub use ocrmypdf::OcrMyPdfEngine;

use crate::error::{AnonymizerError, AnonymizerResult};
use crate::runtime;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Default deadline for one document.
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(300);

/// Failure reported by an OCR engine.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with status {code:?}: {stderr}")]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("OCR I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OCR produced no output")]
    EmptyOutput,
}

/// Pre-processing flags passed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrOptions {
    pub deskew: bool,
    pub force_ocr: bool,
    pub rotate_pages: bool,
    pub remove_background: bool,
    /// Output optimization level (0-3)
    pub optimize: u8,
}

impl Default for OcrOptions {
    fn default() -> Self {
        Self {
            deskew: true,
            force_ocr: true,
            rotate_pages: true,
            remove_background: true,
            optimize: 1,
        }
    }
}

/// Adds a synthetic text layer to an image-only PDF.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Reads `input`, writes the searchable PDF to `output`.
    async fn ocr(
        &self,
        input: &Path,
        output: &Path,
        language: &str,
        options: &OcrOptions,
    ) -> Result<(), OcrError>;

    fn name(&self) -> &str;
}

/// Outcome of one bounded OCR run.
#[derive(Debug)]
pub enum OcrOutcome {
    Completed(Vec<u8>),
    TimedOut { after: Duration },
    Failed { reason: String },
}

/// Runs an [`OcrEngine`] under a hard timeout.
#[derive(Clone)]
pub struct OcrWorker {
    engine: Arc<dyn OcrEngine>,
    language: String,
    options: OcrOptions,
    timeout: Duration,
}

impl OcrWorker {
    pub fn new(engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            language: "fra".to_string(),
            options: OcrOptions::default(),
            timeout: DEFAULT_OCR_TIMEOUT,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_options(mut self, options: OcrOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs OCR and returns the searchable PDF; fails closed on timeout or
    /// engine failure.
    pub fn run(&self, pdf: &[u8]) -> AnonymizerResult<Vec<u8>> {
        match self.execute(pdf) {
            OcrOutcome::Completed(bytes) => Ok(bytes),
            OcrOutcome::TimedOut { after } => Err(AnonymizerError::OcrTimeout { after }),
            OcrOutcome::Failed { reason } => Err(AnonymizerError::OcrFailure { reason }),
        }
    }

    /// Runs OCR and reports how it ended.
    pub fn execute(&self, pdf: &[u8]) -> OcrOutcome {
        let start = Instant::now();
        let workdir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                return OcrOutcome::Failed {
                    reason: format!("cannot create work directory: {}", e),
                }
            }
        };
        let input = workdir.path().join("input.pdf");
        let output = workdir.path().join("output.pdf");
        if let Err(e) = std::fs::write(&input, pdf) {
            return OcrOutcome::Failed {
                reason: format!("cannot stage input: {}", e),
            };
        }

        info!(engine = self.engine.name(), timeout_s = self.timeout.as_secs(), "Starting OCR");
        // The private runtime is gone once `run` returns, so whatever the
        // cancelled engine spawned has been killed and reaped.
        let result = match runtime::run(async {
            tokio::time::timeout(
                self.timeout,
                self.engine
                    .ocr(&input, &output, &self.language, &self.options),
            )
            .await
        }) {
            Ok(result) => result,
            Err(e) => {
                return OcrOutcome::Failed {
                    reason: format!("cannot start OCR runtime: {}", e),
                }
            }
        };

        let outcome = match result {
            Err(_) => OcrOutcome::TimedOut {
                after: self.timeout,
            },
            Ok(Err(e)) => OcrOutcome::Failed {
                reason: e.to_string(),
            },
            Ok(Ok(())) => match std::fs::read(&output) {
                Ok(bytes) if !bytes.is_empty() => OcrOutcome::Completed(bytes),
                Ok(_) => OcrOutcome::Failed {
                    reason: OcrError::EmptyOutput.to_string(),
                },
                Err(e) => OcrOutcome::Failed {
                    reason: format!("cannot read OCR output: {}", e),
                },
            },
        };

        match &outcome {
            OcrOutcome::Completed(bytes) => info!(
                bytes = bytes.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "OCR completed"
            ),
            OcrOutcome::TimedOut { after } => {
                warn!(after_s = after.as_secs(), "OCR timed out, document rejected")
            }
            OcrOutcome::Failed { reason } => warn!(%reason, "OCR failed, document rejected"),
        }
        outcome
    }
}

impl std::fmt::Debug for OcrWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrWorker")
            .field("engine", &self.engine.name())
            .field("language", &self.language)
            .field("options", &self.options)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCategory;

    struct SlowEngine;

    #[async_trait]
    impl OcrEngine for SlowEngine {
        async fn ocr(&self, _: &Path, _: &Path, _: &str, _: &OcrOptions) -> Result<(), OcrError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    struct CopyEngine;

    #[async_trait]
    impl OcrEngine for CopyEngine {
        async fn ocr(
            &self,
            input: &Path,
            output: &Path,
            language: &str,
            _: &OcrOptions,
        ) -> Result<(), OcrError> {
            assert_eq!(language, "fra");
            std::fs::copy(input, output)?;
            Ok(())
        }

        fn name(&self) -> &str {
            "copy"
        }
    }

    struct SilentEngine;

    #[async_trait]
    impl OcrEngine for SilentEngine {
        async fn ocr(&self, _: &Path, _: &Path, _: &str, _: &OcrOptions) -> Result<(), OcrError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "silent"
        }
    }

    #[test]
    fn test_timeout_fails_closed() {
        let worker = OcrWorker::new(Arc::new(SlowEngine)).with_timeout(Duration::from_millis(50));
        let started = Instant::now();
        let err = worker.run(b"%PDF-1.4").unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(err.category(), FailureCategory::Timeout);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_completed_run_returns_output() {
        let worker = OcrWorker::new(Arc::new(CopyEngine));
        assert_eq!(worker.run(b"%PDF-1.4 scanned").unwrap(), b"%PDF-1.4 scanned");
    }

    #[tokio::test]
    async fn test_run_from_async_code() {
        let worker = OcrWorker::new(Arc::new(CopyEngine));
        assert_eq!(worker.run(b"%PDF-1.4 scanned").unwrap(), b"%PDF-1.4 scanned");

        let slow = OcrWorker::new(Arc::new(SlowEngine)).with_timeout(Duration::from_millis(50));
        assert!(matches!(slow.execute(b"%PDF"), OcrOutcome::TimedOut { .. }));
    }

    #[test]
    fn test_missing_output_is_a_failure() {
        let worker = OcrWorker::new(Arc::new(SilentEngine));
        assert!(matches!(worker.execute(b"%PDF"), OcrOutcome::Failed { .. }));
    }
}
