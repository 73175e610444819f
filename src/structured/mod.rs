//! Field-code driven anonymization of structured exports.
//!
//! Ledger exports (FEC) are rewritten column by column; payroll declaration
//! files (DSN) line by line from a code table. Both keep the layout of the
//! input and draw their pseudonyms from a caller-owned [`RunState`].

pub mod declaration;
pub mod ledger;
pub mod run;

pub use declaration::{AgeBucket, DeclarationAnonymizer};
pub use ledger::LedgerAnonymizer;
pub use run::RunState;

use serde::Serialize;
use std::fmt;

/// Kind of transform applied to one structured field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformCategory {
    Constant,
    CounterPseudonym,
    Hash,
    /// Value kept as is (already anonymized, or not sensitive)
    Passthrough,
    TrancheBucket,
    /// Length-preserving mask
    Mask,
}

impl fmt::Display for TransformCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Constant => "constant",
            Self::CounterPseudonym => "counter-pseudonym",
            Self::Hash => "hash",
            Self::Passthrough => "passthrough",
            Self::TrancheBucket => "tranche-bucket",
            Self::Mask => "mask",
        };
        f.write_str(name)
    }
}

/// Audit record of one transformed field.
#[derive(Debug, Clone, Serialize)]
pub struct StructuredField {
    /// Zero-based record (data row or line) index
    pub record: usize,
    /// Column name or declaration code
    pub code: String,
    #[serde(skip_serializing)]
    pub original: String,
    pub transform: TransformCategory,
}

/// Result of anonymizing a structured document.
#[derive(Debug, Clone, Default)]
pub struct StructuredOutput {
    pub text: String,
    pub fields: Vec<StructuredField>,
}

impl StructuredOutput {
    /// Number of fields whose value actually changed.
    pub fn fields_rewritten(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| f.transform != TransformCategory::Passthrough)
            .count()
    }
}
