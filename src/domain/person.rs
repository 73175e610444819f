//! Person and company names.

use super::{PatternMatcher, PiiCategory};
use once_cell::sync::Lazy;
use regex::Regex;

/// Name introduced by a civility, with an upper-case surname:
/// `Monsieur Jean DUPONT`, `Mme Marie-Claire MARTIN`.
#[derive(Debug, Clone, Default)]
pub struct CivilityNameMatcher;

impl CivilityNameMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for CivilityNameMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Name
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\b(?:Madame|Monsieur|Mademoiselle|Mme|Mlle|M\.)\s+(?:[A-ZÉÈ][a-zéèêëàâäîïôöûüç'’\-]+\s+){0,3}[A-ZÉÈÀÂÎÔÛÇ][A-ZÉÈÀÂÎÔÛÇ'’\-]+(?:\s+[A-ZÉÈÀÂÎÔÛÇ][A-ZÉÈÀÂÎÔÛÇ'’\-]+)*\b",
            )
            .expect("Valid name regex")
        });
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Name following a letter salutation or civility in mixed case:
/// `Cher Monsieur Dupont`, `Madame Durand`.
///
/// Only used by the mission-letter ruleset, where surnames are rarely
/// upper-cased.
#[derive(Debug, Clone, Default)]
pub struct SalutationNameMatcher;

impl SalutationNameMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for SalutationNameMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Name
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\b(?:Madame|Monsieur|Mme|M\.)\s+([A-ZÉÈ][\p{L}'’\-]+(?:\s+[A-ZÉÈ][\p{L}'’\-]+){0,2})",
            )
            .expect("Valid salutation regex")
        });
        &PATTERN
    }

    fn find_ranges(&self, text: &str) -> Vec<std::ops::Range<usize>> {
        self.pattern()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.range()))
            .collect()
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.trim().to_string())
    }
}

/// Company name carrying a French legal form: `SARL Boulangerie Petit`,
/// `ACME SAS`.
#[derive(Debug, Clone, Default)]
pub struct CompanyMatcher;

impl CompanyMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for CompanyMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Company
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\b(?:(?:SARL|SASU|SAS|EURL|SCI|SNC|SA)\s+(?:[A-Z0-9][\p{L}0-9&'’\-]*)(?:\s+[A-Z0-9][\p{L}0-9&'’\-]*){0,3}|(?:[A-Z][A-Z0-9&'’\-]+\s+){1,3}(?:SARL|SASU|SAS|EURL|SCI|SNC|SA))\b",
            )
            .expect("Valid company regex")
        });
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}
