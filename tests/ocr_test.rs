//! OCR fallback: scanned PDFs are recognized under a deadline and rejected
//! whenever no trustworthy text layer comes back.

mod common;

use anonymiseur::ocr::{OcrEngine, OcrError, OcrOptions};
use anonymiseur::{Anonymizer, Document, DocumentFormat, FailureCategory, OcrWorker};
use anyhow::Result;
use async_trait::async_trait;
use common::*;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Writes a prepared searchable PDF, as a real engine would.
struct TextLayerEngine(Vec<u8>);

#[async_trait]
impl OcrEngine for TextLayerEngine {
    async fn ocr(&self, _: &Path, output: &Path, _: &str, _: &OcrOptions) -> Result<(), OcrError> {
        std::fs::write(output, &self.0)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "text-layer"
    }
}

/// Echoes the scan back without adding text.
struct EchoEngine;

#[async_trait]
impl OcrEngine for EchoEngine {
    async fn ocr(&self, input: &Path, output: &Path, _: &str, _: &OcrOptions) -> Result<(), OcrError> {
        std::fs::copy(input, output)?;
        Ok(())
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct HangingEngine;

#[async_trait]
impl OcrEngine for HangingEngine {
    async fn ocr(&self, _: &Path, _: &Path, _: &str, _: &OcrOptions) -> Result<(), OcrError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

struct CrashingEngine;

#[async_trait]
impl OcrEngine for CrashingEngine {
    async fn ocr(&self, _: &Path, _: &Path, _: &str, _: &OcrOptions) -> Result<(), OcrError> {
        Err(OcrError::Exit {
            program: "ocrmypdf".to_string(),
            code: Some(2),
            stderr: "PriorOcrFoundError".to_string(),
        })
    }

    fn name(&self) -> &str {
        "crashing"
    }
}

fn anonymizer_with(engine: Arc<dyn OcrEngine>) -> Anonymizer {
    Anonymizer::new().with_ocr(Some(
        OcrWorker::new(engine).with_timeout(Duration::from_millis(500)),
    ))
}

#[test]
fn test_scanned_pdf_is_routed_to_ocr() -> Result<()> {
    with_mupdf_lock!({
        let route = anonymiseur::FormatRouter::new()
            .route(&Document::new("scan.pdf", scanned_pdf()?))?;
        assert!(route.needs_ocr());
        assert_eq!(route.format(), DocumentFormat::PdfScanned);
        Ok(())
    })
}

#[test]
fn test_recognized_scan_is_redacted() -> Result<()> {
    with_mupdf_lock!({
        let anonymizer = anonymizer_with(Arc::new(TextLayerEngine(payslip_pdf()?)));
        let mut run = anonymizer.new_run();
        let anonymized = anonymizer.anonymize(&Document::new("scan.pdf", scanned_pdf()?), &mut run)?;

        assert_eq!(anonymized.format, DocumentFormat::PdfScanned);
        assert!(anonymized.redaction_count > 0);
        assert_all_redacted(&anonymized.bytes, &["DUPONT", "jean.dupont@exemple.fr"]);
        Ok(())
    })
}

#[test]
fn test_timeout_rejects_document() -> Result<()> {
    with_mupdf_lock!({
        let anonymizer = anonymizer_with(Arc::new(HangingEngine));
        let mut run = anonymizer.new_run();

        let started = Instant::now();
        let err = anonymizer
            .anonymize(&Document::new("scan.pdf", scanned_pdf()?), &mut run)
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(err.category(), FailureCategory::Timeout);
        assert!(err.is_retryable());
        Ok(())
    })
}

#[test]
fn test_engine_failure_rejects_document() -> Result<()> {
    with_mupdf_lock!({
        let anonymizer = anonymizer_with(Arc::new(CrashingEngine));
        let mut run = anonymizer.new_run();
        let err = anonymizer
            .anonymize(&Document::new("scan.pdf", scanned_pdf()?), &mut run)
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::Processing);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("PriorOcrFoundError"));
        Ok(())
    })
}

#[test]
fn test_scan_without_recognized_text_is_rejected() -> Result<()> {
    with_mupdf_lock!({
        let anonymizer = anonymizer_with(Arc::new(EchoEngine));
        let mut run = anonymizer.new_run();
        let err = anonymizer
            .anonymize(&Document::new("scan.pdf", scanned_pdf()?), &mut run)
            .unwrap_err();
        assert!(err.to_string().contains("no text recognized"));
        Ok(())
    })
}

#[test]
fn test_disabled_ocr_rejects_scans() -> Result<()> {
    with_mupdf_lock!({
        let anonymizer = Anonymizer::new().with_ocr(None);
        let mut run = anonymizer.new_run();
        let err = anonymizer
            .anonymize(&Document::new("scan.pdf", scanned_pdf()?), &mut run)
            .unwrap_err();
        assert!(err.to_string().contains("OCR is disabled"));
        Ok(())
    })
}

#[test]
fn test_engine_arguments() {
    let args = anonymiseur::OcrMyPdfEngine::arguments(
        Path::new("in.pdf"),
        Path::new("out.pdf"),
        "fra",
        &OcrOptions::default(),
    );
    assert!(args.windows(2).any(|w| w[0] == "-l" && w[1] == "fra"));
    assert!(args.iter().any(|a| a == "--deskew"));
    assert_eq!(args.last().map(String::as_str), Some("out.pdf"));
}
