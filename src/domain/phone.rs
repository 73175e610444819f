//! Phone number domain logic.
//!
//! This module encapsulates the rules for detecting and normalizing French
//! telephone numbers.

use super::{digits_only, PatternMatcher, PiiCategory};
use once_cell::sync::Lazy;
use regex::Regex;

/// French phone number pattern matcher.
///
/// Supports the usual national and international formats:
/// - 01 23 45 67 89
/// - 01.23.45.67.89
/// - 0123456789
/// - +33 1 23 45 67 89
/// - +33 (0)1 23 45 67 89
#[derive(Debug, Clone)]
pub struct FrenchPhoneMatcher;

impl FrenchPhoneMatcher {
    /// Creates a new phone number matcher.
    pub fn new() -> Self {
        Self
    }

    fn regex() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?:(?:\+|\b00)33[\s.]?(?:\(0\)\s?)?|\b0)[1-9](?:[\s.\-]?\d{2}){4}\b")
                .expect("Valid phone number regex")
        });
        &PATTERN
    }

    /// Validates a normalized national number: ten digits, leading zero,
    /// non-zero second digit.
    pub fn validate(normalized: &str) -> bool {
        normalized.len() == 10
            && normalized.starts_with('0')
            && normalized.chars().all(|c| c.is_ascii_digit())
            && normalized
                .chars()
                .nth(1)
                .is_some_and(|c| ('1'..='9').contains(&c))
    }
}

impl Default for FrenchPhoneMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher for FrenchPhoneMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Phone
    }

    fn pattern(&self) -> &Regex {
        Self::regex()
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let m = self.pattern().find(text)?;
        let matched = m.as_str().replace("(0)", "");
        let digits = digits_only(&matched);
        let national = if let Some(rest) = digits.strip_prefix("0033") {
            format!("0{}", rest)
        } else if let Some(rest) = digits.strip_prefix("33").filter(|_| matched.contains('+')) {
            format!("0{}", rest)
        } else {
            digits
        };

        Self::validate(&national).then_some(national)
    }

    fn is_valid(&self, candidate: &str) -> bool {
        self.normalize(candidate).is_some()
    }
}
