//! Replacement text strategies keyed by document type and category.

use super::DocumentType;
use crate::domain::PiiCategory;
use std::collections::HashMap;

/// How a redacted entity is rendered back into the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplacementStrategy {
    /// One mask char per original char, keeping the visual density
    Mask(char),
    /// Nothing is re-inserted
    Blank,
    /// Fixed text such as `[NOM]`
    Placeholder(String),
}

impl ReplacementStrategy {
    pub fn render(&self, original: &str) -> String {
        match self {
            Self::Mask(c) => std::iter::repeat(*c).take(original.chars().count()).collect(),
            Self::Blank => String::new(),
            Self::Placeholder(text) => text.clone(),
        }
    }
}

/// Registry of replacement strategies.
///
/// Lookup order: `(document type, category)`, then `(any, category)`, then
/// the default mask.
#[derive(Debug, Clone)]
pub struct ReplacementRegistry {
    entries: HashMap<(Option<DocumentType>, PiiCategory), ReplacementStrategy>,
    default: ReplacementStrategy,
}

impl ReplacementRegistry {
    /// Empty registry: everything is masked with `mask_char`.
    pub fn new(mask_char: char) -> Self {
        Self {
            entries: HashMap::new(),
            default: ReplacementStrategy::Mask(mask_char),
        }
    }

    /// Registry with the standard policies per document type.
    pub fn standard(mask_char: char) -> Self {
        let mut registry = Self::new(mask_char);

        registry.register(
            Some(DocumentType::Payslip),
            PiiCategory::Name,
            ReplacementStrategy::Blank,
        );
        registry.register(
            Some(DocumentType::Payslip),
            PiiCategory::Address,
            ReplacementStrategy::Blank,
        );

        for (category, placeholder) in [
            (PiiCategory::Name, "[NOM]"),
            (PiiCategory::Address, "[ADRESSE]"),
            (PiiCategory::Company, "[SOCIÉTÉ]"),
        ] {
            registry.register(
                Some(DocumentType::EmploymentContract),
                category,
                ReplacementStrategy::Placeholder(placeholder.to_string()),
            );
        }

        registry.register(
            Some(DocumentType::MissionLetter),
            PiiCategory::Company,
            ReplacementStrategy::Placeholder("[SOCIÉTÉ]".to_string()),
        );

        registry
    }

    pub fn register(
        &mut self,
        document_type: Option<DocumentType>,
        category: PiiCategory,
        strategy: ReplacementStrategy,
    ) {
        self.entries.insert((document_type, category), strategy);
    }

    pub fn strategy(&self, document_type: DocumentType, category: PiiCategory) -> &ReplacementStrategy {
        self.entries
            .get(&(Some(document_type), category))
            .or_else(|| self.entries.get(&(None, category)))
            .unwrap_or(&self.default)
    }

    pub fn replacement(
        &self,
        document_type: DocumentType,
        category: PiiCategory,
        original: &str,
    ) -> String {
        self.strategy(document_type, category).render(original)
    }
}

impl Default for ReplacementRegistry {
    fn default() -> Self {
        Self::standard('*')
    }
}
