//! PII entity data model.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Category of personally identifying or business-sensitive information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PiiCategory {
    /// Person name, usually introduced by a civility
    Name,
    /// Street address or postal code + city
    Address,
    /// 14-digit establishment identifier
    Siret,
    /// Social security number (NIR / NSS)
    Nir,
    Date,
    /// APE/NAF activity code
    NafCode,
    UrssafCode,
    /// Employee number
    Matricule,
    Company,
    Email,
    Phone,
    /// Booking or contract reference
    Reference,
}

impl PiiCategory {
    pub const ALL: [PiiCategory; 12] = [
        Self::Name,
        Self::Address,
        Self::Siret,
        Self::Nir,
        Self::Date,
        Self::NafCode,
        Self::UrssafCode,
        Self::Matricule,
        Self::Company,
        Self::Email,
        Self::Phone,
        Self::Reference,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "NOM",
            Self::Address => "ADRESSE",
            Self::Siret => "SIRET",
            Self::Nir => "NSS",
            Self::Date => "DATE",
            Self::NafCode => "CODE_NAF",
            Self::UrssafCode => "URSSAF",
            Self::Matricule => "MATRICULE",
            Self::Company => "ENTREPRISE",
            Self::Email => "EMAIL",
            Self::Phone => "TELEPHONE",
            Self::Reference => "REFERENCE",
        }
    }

    /// Maps an entity-model label to a category.
    ///
    /// Labels outside the sensitive set (amounts, generic misc) yield `None`.
    pub fn from_model_label(label: &str) -> Option<Self> {
        match label.trim().to_uppercase().as_str() {
            "NOM" | "PER" | "PERSON" => Some(Self::Name),
            "ADRESSE" | "ADDRESS" => Some(Self::Address),
            "SIRET" | "SIREN" => Some(Self::Siret),
            "NSS" | "NIR" => Some(Self::Nir),
            "DATE" => Some(Self::Date),
            "CODE_NAF" | "NAF" | "APE" => Some(Self::NafCode),
            "URSSAF" => Some(Self::UrssafCode),
            "MATRICULE" => Some(Self::Matricule),
            "ORG" | "ENTREPRISE" | "COMPANY" => Some(Self::Company),
            "EMAIL" => Some(Self::Email),
            "TELEPHONE" | "PHONE" => Some(Self::Phone),
            _ => None,
        }
    }
}

/// Which detector produced an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Pattern,
    Model,
}

/// Why a candidate was kept in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suppression {
    /// Not suppressed: the entity will be redacted
    None,
    /// Matches the provider's own name or address
    AllowListed,
    /// Looks like a monetary amount
    Amount,
    /// Labeled ADDRESS without any street keyword
    NotAnAddress,
    /// Labeled MATRICULE without the strict alphanumeric shape
    NotAMatricule,
}

/// Detected PII entity, positioned in char offsets of its span text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiiEntity {
    pub category: PiiCategory,
    pub origin: Origin,
    /// Char range in the span text
    pub range: Range<usize>,
    pub text: String,
    /// 1.0 for pattern matches, model score otherwise
    pub confidence: f32,
    pub suppression: Suppression,
}

impl PiiEntity {
    pub fn new(category: PiiCategory, origin: Origin, range: Range<usize>, text: String) -> Self {
        Self {
            category,
            origin,
            range,
            text,
            confidence: 1.0,
            suppression: Suppression::None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppression != Suppression::None
    }

    pub fn overlaps(&self, other: &PiiEntity) -> bool {
        self.range.start < other.range.end && other.range.start < self.range.end
    }

    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}
