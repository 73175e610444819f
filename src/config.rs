//! Configuration loading with TOML parsing and environment variable overrides.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration. Values are then overridden from `ANONYMISEUR_*`
//! environment variables and validated as a whole.
//!
//! ```toml
//! output_prefix = "anonymise_"
//! account_mask = "prefix"
//! run_scope = "batch"
//!
//! [ocr]
//! language = "fra"
//! timeout_secs = 300
//!
//! [allow_list]
//! terms = ["XPERT-IA"]
//!
//! [signature]
//! enabled = true
//! command = ["python3", "detect_signatures.py"]
//! ```

use crate::domain::suppression::{DEFAULT_ALLOW_PATTERNS, DEFAULT_ALLOW_TERMS};
use crate::domain::{AccountMaskPolicy, AllowList};
use crate::error::{AnonymizerError, AnonymizerResult};
use crate::pipeline::RunScope;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizerConfig {
    /// Prepended to the source basename to name each output
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Ledger account masking: `prefix`, `prefix:N` or `full`
    #[serde(default = "default_account_mask")]
    pub account_mask: String,

    #[serde(default)]
    pub run_scope: RunScope,

    /// Pause between two documents of a batch
    #[serde(default)]
    pub batch_pause_ms: u64,

    /// ISO date age buckets are computed against (defaults to today)
    #[serde(default)]
    pub reference_date: Option<String>,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub redaction: RedactionConfig,

    #[serde(default)]
    pub allow_list: AllowListConfig,

    #[serde(default)]
    pub entity_model: EntityModelConfig,

    #[serde(default)]
    pub signature: SignatureConfig,
}

impl Default for AnonymizerConfig {
    fn default() -> Self {
        Self {
            output_prefix: default_output_prefix(),
            account_mask: default_account_mask(),
            run_scope: RunScope::default(),
            batch_pause_ms: 0,
            reference_date: None,
            ocr: OcrConfig::default(),
            redaction: RedactionConfig::default(),
            allow_list: AllowListConfig::default(),
            entity_model: EntityModelConfig::default(),
            signature: SignatureConfig::default(),
        }
    }
}

impl AnonymizerConfig {
    /// Parses a TOML document without touching the environment.
    pub fn from_toml_str(content: &str) -> AnonymizerResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Failed to parse TOML: {}", e)))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.output_prefix.is_empty() {
            return Err("output_prefix cannot be empty".to_string());
        }
        if self.output_prefix.contains(['/', '\\']) {
            return Err("output_prefix cannot contain a path separator".to_string());
        }
        self.account_mask_policy()?;
        self.parsed_reference_date()?;
        self.ocr.validate()?;
        self.redaction.validate()?;
        self.allow_list.validate()?;
        self.entity_model.validate()?;
        self.signature.validate()?;
        Ok(())
    }

    pub fn account_mask_policy(&self) -> Result<AccountMaskPolicy, String> {
        self.account_mask.parse()
    }

    pub fn parsed_reference_date(&self) -> Result<Option<NaiveDate>, String> {
        self.reference_date
            .as_deref()
            .map(|d| {
                NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
                    .map_err(|e| format!("invalid reference_date '{}': {}", d, e))
            })
            .transpose()
    }
}

/// OCR fallback for scanned PDFs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// When false, scanned PDFs are rejected
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_ocr_program")]
    pub program: String,

    #[serde(default = "default_ocr_language")]
    pub language: String,

    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_true")]
    pub deskew: bool,

    #[serde(default = "default_true")]
    pub force_ocr: bool,

    #[serde(default = "default_true")]
    pub rotate_pages: bool,

    #[serde(default = "default_true")]
    pub remove_background: bool,

    #[serde(default = "default_optimize")]
    pub optimize: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: default_ocr_program(),
            language: default_ocr_language(),
            timeout_secs: default_ocr_timeout_secs(),
            deskew: true,
            force_ocr: true,
            rotate_pages: true,
            remove_background: true,
            optimize: default_optimize(),
        }
    }
}

impl OcrConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("ocr.timeout_secs must be greater than 0".to_string());
        }
        if self.program.trim().is_empty() {
            return Err("ocr.program cannot be empty".to_string());
        }
        if self.language.trim().is_empty() {
            return Err("ocr.language cannot be empty".to_string());
        }
        if self.optimize > 3 {
            return Err(format!(
                "ocr.optimize must be between 0 and 3, got {}",
                self.optimize
            ));
        }
        Ok(())
    }
}

/// Free-text redaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_mask_char")]
    pub mask_char: char,

    /// Baseline offset of re-inserted text, as a fraction of the font size
    #[serde(default = "default_vertical_offset_ratio")]
    pub vertical_offset_ratio: f32,

    #[serde(default)]
    pub horizontal_offset: f32,

    /// Per-page cap on redaction areas
    #[serde(default = "default_max_hits")]
    pub max_hits: u32,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            mask_char: default_mask_char(),
            vertical_offset_ratio: default_vertical_offset_ratio(),
            horizontal_offset: 0.0,
            max_hits: default_max_hits(),
        }
    }
}

impl RedactionConfig {
    fn validate(&self) -> Result<(), String> {
        if self.mask_char.is_whitespace() || self.mask_char.is_control() {
            return Err("redaction.mask_char must be a visible character".to_string());
        }
        if !self.vertical_offset_ratio.is_finite() || self.vertical_offset_ratio < 0.0 {
            return Err("redaction.vertical_offset_ratio must be a non-negative number".to_string());
        }
        if !self.horizontal_offset.is_finite() {
            return Err("redaction.horizontal_offset must be a finite number".to_string());
        }
        if self.max_hits == 0 {
            return Err("redaction.max_hits must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Terms and patterns that are never redacted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowListConfig {
    /// Keep the built-in provider name and address
    #[serde(default = "default_true")]
    pub include_defaults: bool,

    #[serde(default)]
    pub terms: Vec<String>,

    #[serde(default)]
    pub patterns: Vec<String>,
}

impl Default for AllowListConfig {
    fn default() -> Self {
        Self {
            include_defaults: true,
            terms: Vec::new(),
            patterns: Vec::new(),
        }
    }
}

impl AllowListConfig {
    fn validate(&self) -> Result<(), String> {
        self.build().map(|_| ()).map_err(|e| e.to_string())
    }

    /// Compiles the configured entries, built-in ones first.
    pub fn build(&self) -> AnonymizerResult<AllowList> {
        let mut terms: Vec<String> = Vec::new();
        let mut patterns: Vec<String> = Vec::new();
        if self.include_defaults {
            terms.extend(DEFAULT_ALLOW_TERMS.iter().map(|t| t.to_string()));
            patterns.extend(DEFAULT_ALLOW_PATTERNS.iter().map(|p| p.to_string()));
        }
        terms.extend(self.terms.iter().cloned());
        patterns.extend(self.patterns.iter().cloned());
        AllowList::new(&terms, &patterns)
    }
}

/// Entity model backing the pattern rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityModelKind {
    /// Pattern rules only
    #[default]
    None,
    /// TOML gazetteer
    Lexicon,
    /// Long-running JSON-lines process
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityModelConfig {
    #[serde(default)]
    pub kind: EntityModelKind,

    /// Lexicon file
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Program and arguments of the model process
    #[serde(default)]
    pub command: Vec<String>,

    /// Deadline for one reply of the model process
    #[serde(default = "default_model_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EntityModelConfig {
    fn default() -> Self {
        Self {
            kind: EntityModelKind::default(),
            path: None,
            command: Vec::new(),
            timeout_secs: default_model_timeout_secs(),
        }
    }
}

impl EntityModelConfig {
    fn validate(&self) -> Result<(), String> {
        if self.timeout_secs == 0 {
            return Err("entity_model.timeout_secs must be greater than 0".to_string());
        }
        match self.kind {
            EntityModelKind::None => Ok(()),
            EntityModelKind::Lexicon if self.path.is_none() => {
                Err("entity_model.path is required for the lexicon model".to_string())
            }
            EntityModelKind::Lexicon => Ok(()),
            EntityModelKind::Command if self.command.is_empty() => {
                Err("entity_model.command is required for the command model".to_string())
            }
            EntityModelKind::Command => Ok(()),
        }
    }
}

/// Signature masking on contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Rendering scale of pages handed to the detector
    #[serde(default = "default_render_zoom")]
    pub render_zoom: f32,

    #[serde(default = "default_caption")]
    pub caption: String,

    /// Detector program and arguments; the page image path is appended
    #[serde(default)]
    pub command: Vec<String>,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            confidence_threshold: default_confidence_threshold(),
            render_zoom: default_render_zoom(),
            caption: default_caption(),
            command: Vec::new(),
        }
    }
}

impl SignatureConfig {
    fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(format!(
                "signature.confidence_threshold must be between 0 and 1, got {}",
                self.confidence_threshold
            ));
        }
        if !self.render_zoom.is_finite() || self.render_zoom <= 0.0 {
            return Err(format!(
                "signature.render_zoom must be greater than 0, got {}",
                self.render_zoom
            ));
        }
        if self.enabled && self.command.is_empty() {
            return Err("signature.command is required when signature masking is enabled".to_string());
        }
        Ok(())
    }
}

fn default_output_prefix() -> String {
    "anonymise_".to_string()
}

fn default_account_mask() -> String {
    "prefix".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ocr_program() -> String {
    "ocrmypdf".to_string()
}

fn default_ocr_language() -> String {
    "fra".to_string()
}

fn default_ocr_timeout_secs() -> u64 {
    300
}

fn default_model_timeout_secs() -> u64 {
    30
}

fn default_optimize() -> u8 {
    1
}

fn default_mask_char() -> char {
    '*'
}

fn default_vertical_offset_ratio() -> f32 {
    0.8
}

fn default_max_hits() -> u32 {
    500
}

fn default_confidence_threshold() -> f32 {
    0.5
}

fn default_render_zoom() -> f32 {
    2.0
}

fn default_caption() -> String {
    crate::redaction::signature::DEFAULT_CAPTION.to_string()
}

fn config_error(reason: impl Into<String>) -> AnonymizerError {
    AnonymizerError::InvalidInput {
        parameter: "config".to_string(),
        reason: reason.into(),
    }
}

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file (a missing `path` means built-in defaults)
/// 2. Parses the TOML into [`AnonymizerConfig`]
/// 3. Applies environment variable overrides (`ANONYMISEUR_*` prefix)
/// 4. Validates the configuration
///
/// # Errors
///
/// Returns [`AnonymizerError::InvalidInput`] if the file cannot be read or
/// parsed, or if validation fails.
pub fn load_config(path: Option<&Path>) -> AnonymizerResult<AnonymizerConfig> {
    let mut config = match path {
        Some(path) => {
            if !path.exists() {
                return Err(config_error(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
            let contents = std::fs::read_to_string(path).map_err(|e| {
                config_error(format!(
                    "Failed to read configuration file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            AnonymizerConfig::from_toml_str(&contents)?
        }
        None => AnonymizerConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;

    config
        .validate()
        .map_err(|e| config_error(format!("Configuration validation failed: {}", e)))?;

    Ok(config)
}

/// Applies environment variable overrides using the `ANONYMISEUR_*` prefix
///
/// Variables follow the pattern `ANONYMISEUR_<SECTION>_<KEY>`, for example
/// `ANONYMISEUR_OCR_TIMEOUT_SECS` or `ANONYMISEUR_SIGNATURE_ENABLED`.
pub fn apply_env_overrides<F>(config: &mut AnonymizerConfig, lookup: F) -> AnonymizerResult<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("ANONYMISEUR_OUTPUT_PREFIX") {
        config.output_prefix = val;
    }
    if let Some(val) = lookup("ANONYMISEUR_ACCOUNT_MASK") {
        config.account_mask = val;
    }
    if let Some(val) = lookup("ANONYMISEUR_RUN_SCOPE") {
        config.run_scope = val.parse().map_err(config_error)?;
    }
    if let Some(val) = lookup("ANONYMISEUR_BATCH_PAUSE_MS") {
        config.batch_pause_ms = parse_number("ANONYMISEUR_BATCH_PAUSE_MS", &val)?;
    }
    if let Some(val) = lookup("ANONYMISEUR_REFERENCE_DATE") {
        config.reference_date = Some(val);
    }

    // OCR overrides
    if let Some(val) = lookup("ANONYMISEUR_OCR_ENABLED") {
        config.ocr.enabled = val.parse().unwrap_or(config.ocr.enabled);
    }
    if let Some(val) = lookup("ANONYMISEUR_OCR_PROGRAM") {
        config.ocr.program = val;
    }
    if let Some(val) = lookup("ANONYMISEUR_OCR_LANGUAGE") {
        config.ocr.language = val;
    }
    if let Some(val) = lookup("ANONYMISEUR_OCR_TIMEOUT_SECS") {
        config.ocr.timeout_secs = parse_number("ANONYMISEUR_OCR_TIMEOUT_SECS", &val)?;
    }

    // Redaction overrides
    if let Some(val) = lookup("ANONYMISEUR_REDACTION_MAX_HITS") {
        config.redaction.max_hits = parse_number("ANONYMISEUR_REDACTION_MAX_HITS", &val)?;
    }

    // Entity model overrides
    if let Some(val) = lookup("ANONYMISEUR_ENTITY_MODEL_KIND") {
        config.entity_model.kind = match val.trim().to_lowercase().as_str() {
            "none" => EntityModelKind::None,
            "lexicon" => EntityModelKind::Lexicon,
            "command" => EntityModelKind::Command,
            other => {
                return Err(config_error(format!(
                    "ANONYMISEUR_ENTITY_MODEL_KIND: unknown model kind '{}'",
                    other
                )))
            }
        };
    }
    if let Some(val) = lookup("ANONYMISEUR_ENTITY_MODEL_PATH") {
        config.entity_model.path = Some(PathBuf::from(val));
    }
    if let Some(val) = lookup("ANONYMISEUR_ENTITY_MODEL_TIMEOUT_SECS") {
        config.entity_model.timeout_secs =
            parse_number("ANONYMISEUR_ENTITY_MODEL_TIMEOUT_SECS", &val)?;
    }

    // Signature overrides
    if let Some(val) = lookup("ANONYMISEUR_SIGNATURE_ENABLED") {
        config.signature.enabled = val.parse().unwrap_or(config.signature.enabled);
    }
    if let Some(val) = lookup("ANONYMISEUR_SIGNATURE_CONFIDENCE_THRESHOLD") {
        config.signature.confidence_threshold =
            parse_number("ANONYMISEUR_SIGNATURE_CONFIDENCE_THRESHOLD", &val)?;
    }

    Ok(())
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> AnonymizerResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| config_error(format!("{}: invalid number '{}'", key, value)))
}
