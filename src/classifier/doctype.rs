//! Document-type classification by keyword presence.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of free-text document; selects the ruleset and replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Payslip,
    EmploymentContract,
    MissionLetter,
    Reservation,
}

impl DocumentType {
    pub const ALL: [DocumentType; 4] = [
        Self::Payslip,
        Self::EmploymentContract,
        Self::MissionLetter,
        Self::Reservation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payslip => "payslip",
            Self::EmploymentContract => "employment_contract",
            Self::MissionLetter => "mission_letter",
            Self::Reservation => "reservation",
        }
    }

    /// Contracts get the signature-masking pass in addition to text redaction.
    pub fn requires_full_redaction(&self) -> bool {
        matches!(self, Self::EmploymentContract)
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| format!("unknown document type '{}'", s))
    }
}

/// Picks a [`DocumentType`] from the extracted text.
#[derive(Debug, Clone, Default)]
pub struct DocumentTypeClassifier;

impl DocumentTypeClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Keyword rules are tried in order; the first hit wins and payslip is
    /// the fallback.
    pub fn classify(&self, text: &str) -> DocumentType {
        let lower = text.to_lowercase();
        let has = |k: &str| lower.contains(k);

        if has("contrat") && has("travail") {
            DocumentType::EmploymentContract
        } else if ["cher monsieur", "chère madame", "lettre de mission"]
            .iter()
            .any(|k| has(k))
        {
            DocumentType::MissionLetter
        } else if ["réservation", "reservation", "booking", "hôtel", "hotel", "check-in"]
            .iter()
            .any(|k| has(k))
        {
            DocumentType::Reservation
        } else {
            DocumentType::Payslip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_rules() {
        let classifier = DocumentTypeClassifier::new();
        assert_eq!(
            classifier.classify("CONTRAT DE TRAVAIL A DUREE INDETERMINEE"),
            DocumentType::EmploymentContract
        );
        assert_eq!(
            classifier.classify("Lettre de mission - exercice 2024"),
            DocumentType::MissionLetter
        );
        assert_eq!(
            classifier.classify("Confirmation de réservation"),
            DocumentType::Reservation
        );
        assert_eq!(
            classifier.classify("BULLETIN DE PAIE - Salaire de base"),
            DocumentType::Payslip
        );
    }

    #[test]
    fn test_contract_wins_over_letter() {
        let text = "Cher Monsieur, veuillez trouver votre contrat de travail";
        assert_eq!(
            DocumentTypeClassifier::new().classify(text),
            DocumentType::EmploymentContract
        );
    }

    #[test]
    fn test_only_contract_requires_full_redaction() {
        let full: Vec<_> = DocumentType::ALL
            .into_iter()
            .filter(DocumentType::requires_full_redaction)
            .collect();
        assert_eq!(full, vec![DocumentType::EmploymentContract]);
    }

    #[test]
    fn test_parse() {
        assert_eq!("payslip".parse(), Ok(DocumentType::Payslip));
        assert!("invoice".parse::<DocumentType>().is_err());
    }
}
