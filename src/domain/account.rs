//! Account and establishment number domain logic.
//!
//! Ledger account numbers are masked by policy; SIRET/SIREN identifiers are
//! detected in free text, with priority given to values announced by their
//! keyword.

use super::{digits_only, PatternMatcher, PiiCategory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;
use std::str::FromStr;

/// Character used to mask account digits.
pub const ACCOUNT_MASK_CHAR: char = 'X';

/// How ledger account numbers are masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountMaskPolicy {
    /// Keep the first `n` characters, replace the rest with `X`
    PreservePrefix(usize),
    /// Replace every character with `X`
    Full,
}

impl Default for AccountMaskPolicy {
    fn default() -> Self {
        Self::PreservePrefix(4)
    }
}

impl AccountMaskPolicy {
    /// Masks an account number. Empty values stay empty and the output keeps
    /// the input length, so masking an already-masked value is a no-op.
    pub fn mask(&self, value: &str) -> String {
        let keep = match self {
            Self::PreservePrefix(n) => *n,
            Self::Full => 0,
        };
        value
            .chars()
            .enumerate()
            .map(|(i, c)| if i < keep { c } else { ACCOUNT_MASK_CHAR })
            .collect()
    }
}

impl FromStr for AccountMaskPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "prefix" => Ok(Self::default()),
            other => match other.strip_prefix("prefix:") {
                Some(n) => n
                    .parse()
                    .map(Self::PreservePrefix)
                    .map_err(|_| format!("invalid prefix length in '{}'", s)),
                None => Err(format!(
                    "unknown account mask policy '{}' (expected prefix, prefix:N or full)",
                    s
                )),
            },
        }
    }
}

/// SIRET (14 digits) and SIREN (9 digits, keyword required) matcher.
#[derive(Debug, Clone)]
pub struct SiretMatcher;

impl SiretMatcher {
    pub fn new() -> Self {
        Self
    }

    fn pattern_siret() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"\b\d{3}[ \u{a0}]?\d{3}[ \u{a0}]?\d{3}[ \u{a0}]?\d{5}\b")
                .expect("Valid regex")
        });
        &PATTERN
    }

    fn pattern_siren_with_context() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)\bsiren\s*(?:n°|no|:)?\s*:?\s*(\d{3}[ \u{a0}]?\d{3}[ \u{a0}]?\d{3})\b")
                .expect("Valid regex")
        });
        &PATTERN
    }

    /// Luhn checksum used by INSEE for SIREN and SIRET. La Poste
    /// establishments (SIREN 356000000) are numbered outside it.
    pub fn luhn_valid(digits: &str) -> bool {
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        let sum: u32 = digits
            .chars()
            .rev()
            .enumerate()
            .map(|(i, c)| {
                let d = c.to_digit(10).unwrap_or(0);
                if i % 2 == 1 {
                    let doubled = d * 2;
                    if doubled > 9 {
                        doubled - 9
                    } else {
                        doubled
                    }
                } else {
                    d
                }
            })
            .sum();
        sum % 10 == 0
    }
}

impl Default for SiretMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternMatcher for SiretMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Siret
    }

    fn pattern(&self) -> &Regex {
        Self::pattern_siret()
    }

    fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = Self::pattern_siret()
            .find_iter(text)
            .map(|m| m.range())
            .collect();

        for caps in Self::pattern_siren_with_context().captures_iter(text) {
            if let Some(m) = caps.get(1) {
                if !ranges.iter().any(|r| r.start <= m.start() && m.end() <= r.end) {
                    ranges.push(m.range());
                }
            }
        }

        ranges.sort_by_key(|r| r.start);
        ranges
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let digits = digits_only(text);
        matches!(digits.len(), 9 | 14).then_some(digits)
    }

    /// Full confidence when the checksum holds; a mistyped number is still
    /// redacted.
    fn confidence(&self, candidate: &str) -> f32 {
        match self.normalize(candidate) {
            Some(digits) if Self::luhn_valid(&digits) || digits.starts_with(LA_POSTE_SIREN) => 1.0,
            Some(_) => SIRET_BAD_CHECKSUM_CONFIDENCE,
            None => 0.0,
        }
    }
}

const LA_POSTE_SIREN: &str = "356000000";

/// Confidence of a SIREN or SIRET failing its checksum.
pub const SIRET_BAD_CHECKSUM_CONFIDENCE: f32 = 0.7;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_mask() {
        let policy = AccountMaskPolicy::PreservePrefix(4);
        assert_eq!(policy.mask("4011000123"), "4011XXXXXX");
        assert_eq!(policy.mask("401"), "401");
        assert_eq!(policy.mask(""), "");
    }

    #[test]
    fn test_full_mask_is_idempotent() {
        let policy = AccountMaskPolicy::Full;
        let once = policy.mask("411CLIENT");
        assert_eq!(once, "XXXXXXXXX");
        assert_eq!(policy.mask(&once), once);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("full".parse(), Ok(AccountMaskPolicy::Full));
        assert_eq!(
            "prefix:3".parse(),
            Ok(AccountMaskPolicy::PreservePrefix(3))
        );
        assert!("partial".parse::<AccountMaskPolicy>().is_err());
    }

    #[test]
    fn test_siret_detection() {
        let matcher = SiretMatcher::new();
        let text = "SIRET : 732 829 320 00074 - SIREN 732829320";
        let found = matcher.extract_all(text);
        assert_eq!(found, vec!["732 829 320 00074", "732829320"]);
        assert!(SiretMatcher::luhn_valid("732829320"));
    }

    #[test]
    fn test_siret_checksum_sets_confidence() {
        let matcher = SiretMatcher::new();
        assert!(SiretMatcher::luhn_valid("73282932000074"));
        assert_eq!(matcher.confidence("732 829 320 00074"), 1.0);
        assert_eq!(
            matcher.confidence("732 829 320 00075"),
            SIRET_BAD_CHECKSUM_CONFIDENCE
        );
        assert_eq!(matcher.extract_all("SIRET 732 829 320 00075").len(), 1);
        assert_eq!(matcher.confidence("35600000000048"), 1.0);
    }
}
