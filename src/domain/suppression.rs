//! Suppression rules: candidates that look like PII but must stay.

use super::address::{has_street_keyword, PostalCityMatcher};
use super::entity::{Origin, PiiCategory, PiiEntity, Suppression};
use super::identifiers::MatriculeMatcher;
use super::{char_range, PatternMatcher};
use crate::error::{AnonymizerError, AnonymizerResult};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::ops::Range;

/// Provider name kept by default.
pub const DEFAULT_ALLOW_TERMS: &[&str] = &["XPERT-IA"];

/// Provider address kept by default.
pub const DEFAULT_ALLOW_PATTERNS: &[&str] = &[r"\d{1,3}\s+avenue\s+magellan"];

/// Organization-identifying boilerplate that is never redacted.
#[derive(Debug, Clone)]
pub struct AllowList {
    terms: Vec<String>,
    patterns: Vec<Regex>,
}

impl AllowList {
    /// Builds an allow-list. Terms are compared case-insensitively; patterns
    /// are compiled case-insensitive.
    pub fn new<S: AsRef<str>>(terms: &[S], patterns: &[S]) -> AnonymizerResult<Self> {
        let compiled = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| AnonymizerError::PatternError {
                        pattern: p.as_ref().to_string(),
                        reason: e.to_string(),
                    })
            })
            .collect::<AnonymizerResult<Vec<_>>>()?;

        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let term_patterns = terms
            .iter()
            .map(|t| {
                RegexBuilder::new(&regex::escape(t))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| AnonymizerError::PatternError {
                        pattern: t.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<AnonymizerResult<Vec<_>>>()?;

        Ok(Self {
            terms,
            patterns: term_patterns.into_iter().chain(compiled).collect(),
        })
    }

    pub fn empty() -> Self {
        Self {
            terms: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Configured literal terms, lower-cased.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// True when the candidate contains an allow-listed term or pattern.
    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(candidate))
    }

    /// Char ranges of `text` covered by allow-listed boilerplate.
    pub fn protected_ranges(&self, text: &str) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = self
            .patterns
            .iter()
            .flat_map(|p| p.find_iter(text).map(|m| char_range(text, m.range())))
            .collect();
        ranges.sort_by_key(|r| r.start);
        ranges
    }

    /// Number of configured terms and patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOW_TERMS, DEFAULT_ALLOW_PATTERNS).unwrap_or_else(|_| Self::empty())
    }
}

/// True for monetary amounts: `1 234,56`, `2 500 €`, `1.234,00 EUR`.
///
/// Bare integers are not amounts unless a currency marker is present, so
/// identifiers such as postal codes are left to their own detectors.
pub fn is_amount(candidate: &str) -> bool {
    static AMOUNT: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)^[-+]?\d{1,3}(?:[\s.\u{a0}\u{202f}]?\d{3})*(?:[.,]\d{1,2})?\s*(?:€|eur|euros?)?$",
        )
        .expect("Valid amount regex")
    });
    static DECIMAL_OR_CURRENCY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)(?:[.,]\d{1,2}\s*(?:€|eur|euros?)?$|€|\beur\b|\beuros?\b)")
            .expect("Valid regex")
    });
    static MONEY_WORDS: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(?:euros?|net|brut|montant|vers[ée]|payer|r[ée]mun[ée]ration|salaire)\b")
            .expect("Valid regex")
    });

    let trimmed = candidate.trim();
    if trimmed.is_empty() {
        return false;
    }
    (AMOUNT.is_match(trimmed) && DECIMAL_OR_CURRENCY.is_match(trimmed))
        || MONEY_WORDS.is_match(trimmed)
}

/// Decides, for each candidate, whether it is actually redacted.
#[derive(Debug, Clone, Default)]
pub struct SuppressionRules {
    allow_list: AllowList,
}

impl SuppressionRules {
    pub fn new(allow_list: AllowList) -> Self {
        Self { allow_list }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Suppression decision for one candidate.
    ///
    /// Order: allow-list, amount, then category-specific shape checks.
    pub fn evaluate(&self, entity: &PiiEntity) -> Suppression {
        let text = entity.text.as_str();
        if self.allow_list.matches(text) {
            return Suppression::AllowListed;
        }
        if is_amount(text) {
            return Suppression::Amount;
        }
        match entity.category {
            PiiCategory::Address
                if !has_street_keyword(text)
                    && PostalCityMatcher::new().find_ranges(text).is_empty() =>
            {
                Suppression::NotAnAddress
            }
            PiiCategory::Matricule
                if entity.origin == Origin::Model && !MatriculeMatcher::is_strict(text) =>
            {
                Suppression::NotAMatricule
            }
            _ => Suppression::None,
        }
    }

    /// Applies `evaluate` to every entity of one span in place.
    ///
    /// A candidate touching allow-listed text anywhere in the span is kept
    /// even if the detector only caught part of the boilerplate.
    pub fn apply(&self, span_text: &str, entities: &mut [PiiEntity]) {
        let protected = self.allow_list.protected_ranges(span_text);
        for entity in entities.iter_mut() {
            let touches_protected = protected
                .iter()
                .any(|p| p.start < entity.range.end && entity.range.start < p.end);
            entity.suppression = if touches_protected {
                Suppression::AllowListed
            } else {
                self.evaluate(entity)
            };
        }
    }
}
