//! Domain models and pattern matchers for French administrative documents.
//!
//! This module contains the data model shared by every branch of the
//! pipeline (documents, text spans, PII entities, redaction operations) and
//! the regex-backed matchers used to find identifiers in free text.

pub mod account;
pub mod address;
pub mod document;
pub mod entity;
pub mod identifiers;
pub mod person;
pub mod phone;
pub mod span;
pub mod suppression;

pub use account::{AccountMaskPolicy, SiretMatcher};
pub use address::{PostalCityMatcher, StreetAddressMatcher};
pub use document::{AnonymizedDocument, Document, DocumentFormat, TextEncoding};
pub use entity::{Origin, PiiCategory, PiiEntity, Suppression};
pub use identifiers::{
    DateMatcher, EmailMatcher, MatriculeMatcher, NafMatcher, NirMatcher, ReferenceMatcher,
    UrssafMatcher,
};
pub use person::{CivilityNameMatcher, CompanyMatcher, SalutationNameMatcher};
pub use phone::FrenchPhoneMatcher;
pub use span::{BBox, RedactionOp, TextSpan};
pub use suppression::{AllowList, SuppressionRules};

use regex::Regex;
use std::ops::Range;

/// Trait for pattern matching strategies.
pub trait PatternMatcher: Send + Sync {
    /// Category assigned to every match of this matcher.
    fn category(&self) -> PiiCategory;

    fn pattern(&self) -> &Regex;

    /// Byte ranges of the sensitive part of each match.
    ///
    /// Matchers that need surrounding context (a keyword before the value)
    /// override this to return only the captured value.
    fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        self.pattern()
            .find_iter(text)
            .map(|m| m.range())
            .filter(|r| self.is_valid(&text[r.clone()]))
            .collect()
    }

    fn extract_all<'a>(&self, text: &'a str) -> Vec<&'a str> {
        self.find_ranges(text)
            .into_iter()
            .map(|r| &text[r])
            .collect()
    }

    /// Canonical form of a match (digits only for numeric identifiers).
    fn normalize(&self, text: &str) -> Option<String>;

    /// Extra validation beyond the regex.
    fn is_valid(&self, _candidate: &str) -> bool {
        true
    }

    /// Confidence of a match in `[0, 1]`.
    fn confidence(&self, _candidate: &str) -> f32 {
        1.0
    }
}

/// Keeps only ASCII digits.
pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Converts a byte offset of `text` into a char offset.
pub fn char_offset(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

/// Converts a byte range of `text` into a char range.
pub fn char_range(text: &str, range: Range<usize>) -> Range<usize> {
    let start = char_offset(text, range.start);
    let len = text[range].chars().count();
    start..start + len
}
