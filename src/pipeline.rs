//! Document anonymization pipeline.
//!
//! [`Anonymizer`] routes each document to its branch (structured rewrite,
//! PDF redaction with OCR fallback, or word-processor redaction), adds the
//! signature pass for contracts and names the artifact. Batches are run
//! strictly one document after the other, and one failed document never
//! stops the rest.

use crate::classifier::{
    CommandEntityModel, DocumentType, EntityClassifier, EntityModel, LexiconEntityModel,
    NullEntityModel, ReplacementRegistry,
};
use crate::config::{AnonymizerConfig, EntityModelKind};
use crate::domain::{
    AccountMaskPolicy, AnonymizedDocument, Document, DocumentFormat, SuppressionRules,
};
use crate::error::{AnonymizerError, AnonymizerResult, FailureCategory};
use crate::ocr::{OcrMyPdfEngine, OcrOptions, OcrWorker};
use crate::redaction::{
    CommandSignatureDetector, InsertionStyle, RedactionService, SecureRedactionStrategy,
    SignatureMasker,
};
use crate::router::{FormatRouter, Route};
use crate::structured::{DeclarationAnonymizer, LedgerAnonymizer, RunState};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Lifetime of pseudonym counters and hash salt within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunScope {
    /// One state for the whole batch: a label keeps its pseudonym across files
    #[default]
    Batch,
    /// Fresh state for every document
    Document,
}

impl FromStr for RunScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "batch" => Ok(Self::Batch),
            "document" => Ok(Self::Document),
            other => Err(format!(
                "unknown run scope '{}' (expected batch or document)",
                other
            )),
        }
    }
}

/// What the `classify` command reports for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub format: DocumentFormat,
    /// Only set for free-text documents
    pub document_type: Option<DocumentType>,
    /// Detected category (or structured transform) and its count
    pub categories: BTreeMap<String, usize>,
}

/// Result of one file of a batch.
#[derive(Debug, Clone)]
pub enum DocumentOutcome {
    Written {
        source: PathBuf,
        output: PathBuf,
        format: DocumentFormat,
        redactions: usize,
        image_backed: bool,
    },
    Failed {
        source: PathBuf,
        category: FailureCategory,
        reason: String,
    },
}

impl DocumentOutcome {
    pub fn source(&self) -> &Path {
        match self {
            Self::Written { source, .. } | Self::Failed { source, .. } => source,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for DocumentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Written {
                source,
                output,
                redactions,
                image_backed,
                ..
            } => {
                write!(
                    f,
                    "{} -> {} ({} redaction(s){})",
                    source.display(),
                    output.display(),
                    redactions,
                    if *image_backed { ", image-backed" } else { "" }
                )
            }
            Self::Failed {
                source,
                category,
                reason,
            } => write!(f, "{} FAILED [{}]: {}", source.display(), category, reason),
        }
    }
}

/// Outcomes of a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub outcomes: Vec<DocumentOutcome>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_failure()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn total_redactions(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                DocumentOutcome::Written { redactions, .. } => *redactions,
                DocumentOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

/// Anonymizes documents of every supported format.
pub struct Anonymizer {
    router: FormatRouter,
    ledger: LedgerAnonymizer,
    declaration: DeclarationAnonymizer,
    classifier: EntityClassifier,
    pdf: RedactionService,
    word: RedactionService,
    ocr: Option<OcrWorker>,
    signature: Option<SignatureMasker>,
    output_prefix: String,
    run_scope: RunScope,
    batch_pause: Duration,
    reference_date: Option<NaiveDate>,
}

impl Default for Anonymizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Anonymizer {
    /// Pattern rules only, standard replacements, `ocrmypdf` OCR and no
    /// signature detector.
    pub fn new() -> Self {
        let registry = ReplacementRegistry::standard('*');
        Self {
            router: FormatRouter::new(),
            ledger: LedgerAnonymizer::new(AccountMaskPolicy::default()),
            declaration: DeclarationAnonymizer::new(),
            classifier: EntityClassifier::pattern_only(),
            pdf: RedactionService::with_secure_strategy().with_registry(registry.clone()),
            word: RedactionService::with_word_strategy().with_registry(registry),
            ocr: Some(OcrWorker::new(Arc::new(OcrMyPdfEngine::default()))),
            signature: None,
            output_prefix: "anonymise_".to_string(),
            run_scope: RunScope::Batch,
            batch_pause: Duration::ZERO,
            reference_date: None,
        }
    }

    /// Builds every collaborator from a validated configuration.
    pub fn from_config(config: &AnonymizerConfig) -> AnonymizerResult<Self> {
        let invalid = |reason: String| AnonymizerError::InvalidInput {
            parameter: "config".to_string(),
            reason,
        };
        config.validate().map_err(invalid)?;

        let account_mask = config.account_mask_policy().map_err(invalid)?;
        let reference_date = config.parsed_reference_date().map_err(invalid)?;

        let model: Box<dyn EntityModel> = match config.entity_model.kind {
            EntityModelKind::None => Box::new(NullEntityModel),
            EntityModelKind::Lexicon => {
                let path = config
                    .entity_model
                    .path
                    .as_deref()
                    .ok_or_else(|| invalid("entity_model.path is not set".to_string()))?;
                Box::new(LexiconEntityModel::from_path(path)?)
            }
            EntityModelKind::Command => {
                Box::new(
                    CommandEntityModel::spawn(&config.entity_model.command)?.with_timeout(
                        Duration::from_secs(config.entity_model.timeout_secs),
                    ),
                )
            }
        };
        let suppression = SuppressionRules::new(config.allow_list.build()?);
        let classifier = EntityClassifier::new(model, suppression);

        let registry = ReplacementRegistry::standard(config.redaction.mask_char);
        let style = InsertionStyle {
            vertical_offset_ratio: config.redaction.vertical_offset_ratio,
            horizontal_offset: config.redaction.horizontal_offset,
        };
        let strategy = SecureRedactionStrategy::new()
            .with_max_hits(config.redaction.max_hits)
            .with_style(style);

        let ocr = config.ocr.enabled.then(|| {
            let options = OcrOptions {
                deskew: config.ocr.deskew,
                force_ocr: config.ocr.force_ocr,
                rotate_pages: config.ocr.rotate_pages,
                remove_background: config.ocr.remove_background,
                optimize: config.ocr.optimize,
            };
            OcrWorker::new(Arc::new(OcrMyPdfEngine::new(config.ocr.program.clone())))
                .with_language(config.ocr.language.clone())
                .with_options(options)
                .with_timeout(Duration::from_secs(config.ocr.timeout_secs))
        });

        let signature = if config.signature.enabled {
            let detector = CommandSignatureDetector::new(config.signature.command.clone())?;
            Some(
                SignatureMasker::new(Box::new(detector))
                    .with_threshold(config.signature.confidence_threshold)
                    .with_zoom(config.signature.render_zoom)
                    .with_caption(config.signature.caption.clone()),
            )
        } else {
            None
        };

        info!(
            model = classifier.model_name(),
            ocr = ocr.is_some(),
            signature = signature.is_some(),
            run_scope = ?config.run_scope,
            "Anonymizer configured"
        );

        Ok(Self {
            router: FormatRouter::new(),
            ledger: LedgerAnonymizer::new(account_mask),
            declaration: DeclarationAnonymizer::new(),
            classifier,
            pdf: RedactionService::new(Box::new(strategy)).with_registry(registry.clone()),
            word: RedactionService::with_word_strategy().with_registry(registry),
            ocr,
            signature,
            output_prefix: config.output_prefix.clone(),
            run_scope: config.run_scope,
            batch_pause: Duration::from_millis(config.batch_pause_ms),
            reference_date,
        })
    }

    pub fn with_classifier(mut self, classifier: EntityClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_account_mask(mut self, policy: AccountMaskPolicy) -> Self {
        self.ledger = LedgerAnonymizer::new(policy);
        self
    }

    /// `None` rejects scanned PDFs instead of running OCR.
    pub fn with_ocr(mut self, worker: Option<OcrWorker>) -> Self {
        self.ocr = worker;
        self
    }

    pub fn with_signature_masker(mut self, masker: SignatureMasker) -> Self {
        self.signature = Some(masker);
        self
    }

    pub fn with_output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    pub fn with_run_scope(mut self, scope: RunScope) -> Self {
        self.run_scope = scope;
        self
    }

    pub fn with_batch_pause(mut self, pause: Duration) -> Self {
        self.batch_pause = pause;
        self
    }

    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn classifier(&self) -> &EntityClassifier {
        &self.classifier
    }

    /// Fresh pseudonym state honoring the configured reference date.
    pub fn new_run(&self) -> RunState {
        let run = RunState::new();
        match self.reference_date {
            Some(date) => run.with_reference_date(date),
            None => run,
        }
    }

    /// Anonymizes one document.
    ///
    /// On error no artifact is returned; there is no partially anonymized
    /// output.
    pub fn anonymize(
        &self,
        document: &Document,
        run: &mut RunState,
    ) -> AnonymizerResult<AnonymizedDocument> {
        let route = self.router.route(document)?;
        info!(name = document.name(), route = %route, "Anonymizing document");

        let (bytes, document_type, redaction_count, image_backed) = match route {
            Route::Structured(format) => {
                let text = document.text();
                let output = match format {
                    DocumentFormat::TabularLedger => self.ledger.anonymize(&text, run)?,
                    _ => self.declaration.anonymize(&text, run)?,
                };
                let count = output.fields_rewritten();
                (document.encoding().encode(&output.text), None, count, false)
            }
            Route::Pdf { has_text } => {
                let searchable;
                let pdf = if has_text {
                    document.bytes()
                } else {
                    searchable = self.recognize(document)?;
                    searchable.as_slice()
                };
                let outcome = self.pdf.redact(pdf, &self.classifier)?;
                let (bytes, image_backed) =
                    self.mask_signatures(outcome.document_type, outcome.bytes)?;
                (
                    bytes,
                    Some(outcome.document_type),
                    outcome.operations.len(),
                    image_backed,
                )
            }
            Route::Word => {
                let outcome = self.word.redact(document.bytes(), &self.classifier)?;
                (
                    outcome.bytes,
                    Some(outcome.document_type),
                    outcome.operations.len(),
                    false,
                )
            }
        };

        let anonymized = AnonymizedDocument {
            file_name: AnonymizedDocument::output_name(&self.output_prefix, document.name()),
            bytes,
            format: route.format(),
            document_type,
            redaction_count,
            image_backed,
        };
        info!(
            name = document.name(),
            output = %anonymized.file_name,
            redactions = anonymized.redaction_count,
            image_backed = anonymized.image_backed,
            "Document anonymized"
        );
        Ok(anonymized)
    }

    pub fn anonymize_path(
        &self,
        path: &Path,
        run: &mut RunState,
    ) -> AnonymizerResult<AnonymizedDocument> {
        let document = Document::from_path(path)?;
        self.anonymize(&document, run)
    }

    /// Anonymizes `paths` one after the other and writes each artifact under
    /// `output_dir`.
    pub fn anonymize_batch(&self, paths: &[PathBuf], output_dir: &Path) -> BatchReport {
        let mut report = BatchReport::default();
        let mut run = self.new_run();

        for (index, path) in paths.iter().enumerate() {
            if index > 0 {
                if self.run_scope == RunScope::Document {
                    run = self.new_run();
                }
                if !self.batch_pause.is_zero() {
                    std::thread::sleep(self.batch_pause);
                }
            }

            let outcome = match self
                .anonymize_path(path, &mut run)
                .and_then(|doc| doc.write_to(output_dir).map(|output| (doc, output)))
            {
                Ok((doc, output)) => DocumentOutcome::Written {
                    source: path.clone(),
                    output,
                    format: doc.format,
                    redactions: doc.redaction_count,
                    image_backed: doc.image_backed,
                },
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        category = %e.category(),
                        error = %e,
                        "Document failed"
                    );
                    DocumentOutcome::Failed {
                        source: path.clone(),
                        category: e.category(),
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            written = report.written(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }

    /// Document type and detected categories, without producing output.
    pub fn classify(&self, document: &Document) -> AnonymizerResult<Classification> {
        let route = self.router.route(document)?;
        let mut categories = BTreeMap::new();

        let document_type = match route {
            Route::Structured(format) => {
                let text = document.text();
                let mut run = self.new_run();
                let output = match format {
                    DocumentFormat::TabularLedger => self.ledger.anonymize(&text, &mut run)?,
                    _ => self.declaration.anonymize(&text, &mut run)?,
                };
                for field in &output.fields {
                    *categories.entry(field.transform.to_string()).or_insert(0) += 1;
                }
                None
            }
            Route::Pdf { .. } | Route::Word => {
                let searchable;
                let (service, bytes) = match route {
                    Route::Word => (&self.word, document.bytes()),
                    Route::Pdf { has_text: false } => {
                        searchable = self.recognize(document)?;
                        (&self.pdf, searchable.as_slice())
                    }
                    _ => (&self.pdf, document.bytes()),
                };
                let analysis = service.analyze(bytes, &self.classifier)?;
                for op in &analysis.operations {
                    *categories.entry(op.category.label().to_string()).or_insert(0) += 1;
                }
                Some(analysis.document_type)
            }
        };

        Ok(Classification {
            format: route.format(),
            document_type,
            categories,
        })
    }

    /// Text of a document as the pipeline sees it.
    pub fn extract_text(&self, document: &Document) -> AnonymizerResult<String> {
        let route = self.router.route(document)?;
        let service = match route {
            Route::Structured(_) => return Ok(document.text()),
            Route::Pdf { .. } => &self.pdf,
            Route::Word => &self.word,
        };
        let dir = tempfile::tempdir()?;
        let extension = document.extension().unwrap_or_default();
        let path = dir.path().join(format!("document.{}", extension));
        std::fs::write(&path, document.bytes()).map_err(|e| AnonymizerError::Io {
            path: path.clone(),
            source: e,
        })?;
        service.extract_text(&path)
    }

    /// OCR pass for a scanned PDF. The result must expose a text layer,
    /// otherwise the document is rejected rather than returned unredacted.
    fn recognize(&self, document: &Document) -> AnonymizerResult<Vec<u8>> {
        let worker = self.ocr.as_ref().ok_or_else(|| AnonymizerError::OcrFailure {
            reason: "document has no text layer and OCR is disabled".to_string(),
        })?;
        let searchable = worker.run(document.bytes())?;

        let recognized = Document::new(document.name(), searchable);
        match self.router.route(&recognized)? {
            Route::Pdf { has_text: true } => Ok(recognized.bytes().to_vec()),
            _ => Err(AnonymizerError::OcrFailure {
                reason: "no text recognized".to_string(),
            }),
        }
    }

    fn mask_signatures(
        &self,
        document_type: DocumentType,
        bytes: Vec<u8>,
    ) -> AnonymizerResult<(Vec<u8>, bool)> {
        if !document_type.requires_full_redaction() {
            return Ok((bytes, false));
        }
        let Some(masker) = &self.signature else {
            debug!(%document_type, "No signature detector configured");
            return Ok((bytes, false));
        };
        let outcome = masker.mask(&bytes)?;
        Ok((outcome.bytes, outcome.image_backed))
    }
}

impl fmt::Debug for Anonymizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Anonymizer")
            .field("classifier", &self.classifier)
            .field("ocr", &self.ocr)
            .field(
                "signature",
                &self.signature.as_ref().map(|s| s.detector_name().to_string()),
            )
            .field("output_prefix", &self.output_prefix)
            .field("run_scope", &self.run_scope)
            .finish()
    }
}
