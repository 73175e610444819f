//! Ledger export (FEC) anonymization.

use super::{RunState, StructuredField, StructuredOutput, TransformCategory};
use crate::domain::AccountMaskPolicy;
use crate::error::{AnonymizerError, AnonymizerResult};
use csv::{QuoteStyle, ReaderBuilder, Terminator, WriterBuilder};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Constant written over entry labels.
pub const ENTRY_LABEL_PLACEHOLDER: &str = "Libellé anonymisé";

/// Columns the ledger transform rewrites.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    "CompteNum",
    "CompteLib",
    "CompAuxNum",
    "CompAuxLib",
    "PieceRef",
    "EcritureLib",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Account,
    AccountLabel,
    AuxiliaryLabel,
    Reference,
    EntryLabel,
}

impl Column {
    fn for_name(name: &str) -> Option<Self> {
        match name {
            "CompteNum" | "CompAuxNum" => Some(Self::Account),
            "CompteLib" => Some(Self::AccountLabel),
            "CompAuxLib" => Some(Self::AuxiliaryLabel),
            "PieceRef" => Some(Self::Reference),
            "EcritureLib" => Some(Self::EntryLabel),
            _ => None,
        }
    }
}

/// Picks `|` when the header line holds more pipes than tabs.
pub fn detect_delimiter(header: &str) -> u8 {
    let pipes = header.matches('|').count();
    let tabs = header.matches('\t').count();
    if pipes > tabs {
        b'|'
    } else {
        b'\t'
    }
}

/// Rewrites the sensitive columns of a ledger export.
#[derive(Debug, Clone, Default)]
pub struct LedgerAnonymizer {
    account_mask: AccountMaskPolicy,
}

impl LedgerAnonymizer {
    pub fn new(account_mask: AccountMaskPolicy) -> Self {
        Self { account_mask }
    }

    pub fn anonymize(&self, text: &str, run: &mut RunState) -> AnonymizerResult<StructuredOutput> {
        let header_line = text
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| format_error("empty file"))?;
        let delimiter = detect_delimiter(header_line);
        let terminator = if text.contains("\r\n") {
            Terminator::CRLF
        } else {
            Terminator::Any(b'\n')
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .from_reader(text.as_bytes());
        let mut writer = WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .quote_style(QuoteStyle::Never)
            .terminator(terminator)
            .from_writer(Vec::new());

        let mut records = reader.records();
        let header = records
            .next()
            .ok_or_else(|| format_error("empty file"))?
            .map_err(|e| format_error(&e.to_string()))?;

        if header.iter().all(|h| h.trim().is_empty()) {
            return Err(format_error("empty header"));
        }

        let columns: Vec<Option<Column>> =
            header.iter().map(|h| Column::for_name(h.trim())).collect();
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| !header.iter().any(|h| h.trim() == *c))
            .collect();
        if missing.len() == REQUIRED_COLUMNS.len() {
            return Err(format_error("none of the required ledger columns are present"));
        }
        for column in &missing {
            warn!(column, "Ledger column missing, treated as empty");
        }

        writer
            .write_record(&header)
            .map_err(|e| format_error(&e.to_string()))?;

        let mut output = StructuredOutput::default();
        for (index, record) in records.enumerate() {
            let record = record.map_err(|e| format_error(&e.to_string()))?;
            let mut rewritten = Vec::with_capacity(record.len());
            for (position, value) in record.iter().enumerate() {
                let column = columns.get(position).copied().flatten();
                match column {
                    Some(kind) if !value.trim().is_empty() => {
                        let (new_value, transform) = self.transform(kind, value, run);
                        output.fields.push(StructuredField {
                            record: index,
                            code: header.get(position).unwrap_or_default().trim().to_string(),
                            original: value.to_string(),
                            transform,
                        });
                        rewritten.push(new_value);
                    }
                    _ => rewritten.push(value.to_string()),
                }
            }
            writer
                .write_record(&rewritten)
                .map_err(|e| format_error(&e.to_string()))?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| format_error(&e.to_string()))?;
        output.text = String::from_utf8(bytes).map_err(|e| format_error(&e.to_string()))?;
        if !text.ends_with('\n') && output.text.ends_with('\n') {
            let trimmed_len = output.text.trim_end_matches(['\r', '\n']).len();
            output.text.truncate(trimmed_len);
        }

        debug!(
            rows = output.fields.iter().map(|f| f.record).max().map_or(0, |m| m + 1),
            rewritten = output.fields_rewritten(),
            "Ledger anonymized"
        );
        Ok(output)
    }

    fn transform(&self, column: Column, value: &str, run: &mut RunState) -> (String, TransformCategory) {
        static CLIENT: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^Client\d{3,}$").expect("Valid regex"));
        static REFERENCE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^REF-\d+$").expect("Valid regex"));

        let trimmed = value.trim();
        match column {
            Column::Account => {
                let masked = self.account_mask.mask(trimmed);
                if masked == trimmed {
                    (masked, TransformCategory::Passthrough)
                } else {
                    (masked, TransformCategory::Mask)
                }
            }
            Column::AccountLabel | Column::AuxiliaryLabel if CLIENT.is_match(trimmed) => {
                (trimmed.to_string(), TransformCategory::Passthrough)
            }
            Column::AccountLabel => (
                run.account_label_pseudonym(trimmed),
                TransformCategory::CounterPseudonym,
            ),
            Column::AuxiliaryLabel => (run.client_pseudonym(trimmed), TransformCategory::CounterPseudonym),
            Column::Reference if REFERENCE.is_match(trimmed) => {
                (trimmed.to_string(), TransformCategory::Passthrough)
            }
            Column::Reference => (
                run.reference_pseudonym(trimmed),
                TransformCategory::CounterPseudonym,
            ),
            Column::EntryLabel if trimmed == ENTRY_LABEL_PLACEHOLDER => {
                (trimmed.to_string(), TransformCategory::Passthrough)
            }
            Column::EntryLabel => (
                ENTRY_LABEL_PLACEHOLDER.to_string(),
                TransformCategory::Constant,
            ),
        }
    }
}

fn format_error(reason: &str) -> AnonymizerError {
    AnonymizerError::StructuredFormat {
        format: "ledger".to_string(),
        reason: reason.to_string(),
    }
}
