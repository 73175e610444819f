//! Administrative identifiers: NIR, NAF, URSSAF, matricule, dates, e-mails
//! and booking references.

use super::{digits_only, PatternMatcher, PiiCategory};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

/// Returns the ranges of capture group 1 for every match of `regex`.
fn group_ranges(regex: &Regex, text: &str) -> Vec<Range<usize>> {
    regex
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.range()))
        .collect()
}

/// French social security number (NIR), 13 digits plus an optional 2-digit key.
#[derive(Debug, Clone, Default)]
pub struct NirMatcher;

impl NirMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Checks the control key of a 15-character NIR (Corsican departments
    /// 2A/2B are substituted as INSEE specifies).
    pub fn key_valid(nir: &str) -> bool {
        let compact: String = nir.chars().filter(|c| !c.is_whitespace() && *c != '.').collect();
        if compact.len() != 15 {
            return false;
        }
        let (body, key) = compact.split_at(13);
        let upper = body.to_uppercase();
        let numeric = if upper.contains("2A") {
            upper.replacen("2A", "19", 1)
        } else if upper.contains("2B") {
            upper.replacen("2B", "18", 1)
        } else {
            upper
        };
        match (numeric.parse::<u64>(), key.parse::<u64>()) {
            (Ok(n), Ok(k)) => 97 - (n % 97) == k,
            _ => false,
        }
    }
}

impl PatternMatcher for NirMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Nir
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\b[12][\s.]?\d{2}[\s.]?(?:0[1-9]|1[0-2]|[2-9]\d)[\s.]?(?:\d{2}|2[AB])[\s.]?\d{3}[\s.]?\d{3}(?:[\s.]?\d{2})?\b",
            )
            .expect("Valid NIR regex")
        });
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let compact: String = text
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        matches!(compact.len(), 13 | 15).then_some(compact)
    }

    /// Any NIR-shaped value matches, whatever its key.
    fn is_valid(&self, candidate: &str) -> bool {
        self.normalize(candidate).is_some()
    }

    /// Full confidence for a bare body or a matching key.
    fn confidence(&self, candidate: &str) -> f32 {
        match self.normalize(candidate) {
            Some(n) if n.len() == 15 && !Self::key_valid(&n) => NIR_BAD_KEY_CONFIDENCE,
            Some(_) => 1.0,
            None => 0.0,
        }
    }
}

/// Confidence of a NIR whose control key does not match.
pub const NIR_BAD_KEY_CONFIDENCE: f32 = 0.6;

/// APE/NAF activity code: `6920Z` or `69.20Z`.
#[derive(Debug, Clone, Default)]
pub struct NafMatcher;

impl NafMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for NafMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::NafCode
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\b\d{2}\.?\d{2}[A-Z]\b").expect("Valid NAF regex"));
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let compact = text.replace('.', "");
        (compact.len() == 5).then_some(compact)
    }
}

/// URSSAF account number, only when announced by the keyword.
#[derive(Debug, Clone, Default)]
pub struct UrssafMatcher;

impl UrssafMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for UrssafMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::UrssafCode
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"(?i)\burssaf\b[^\d\n]{0,30}(\d[\d ]{4,20}\d)").expect("Valid URSSAF regex")
        });
        &PATTERN
    }

    fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        group_ranges(self.pattern(), text)
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let digits = digits_only(text);
        (digits.len() >= 6).then_some(digits)
    }
}

/// Employee number with the strict shape `AB1234`.
#[derive(Debug, Clone, Default)]
pub struct MatriculeMatcher;

impl MatriculeMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Strict alphanumeric shape required for any MATRICULE candidate.
    pub fn is_strict(text: &str) -> bool {
        static STRICT: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^[A-Z]{2,}[0-9]{2,}$").expect("Valid regex"));
        STRICT.is_match(text.trim())
    }
}

impl PatternMatcher for MatriculeMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Matricule
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\b[A-Z]{2,}[0-9]{2,}\b").expect("Valid matricule regex"));
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Self::is_strict(text).then(|| text.trim().to_string())
    }
}

const DATE_NUMERIC: &str = r"(?:0?[1-9]|[12]\d|3[01])[/.\-](?:0?[1-9]|1[0-2])[/.\-](?:19|20)\d{2}";
const DATE_LONG: &str = r"(?i:(?:1er|[1-9]|[12]\d|3[01])\s+(?:janvier|f[ée]vrier|mars|avril|mai|juin|juillet|ao[uû]t|septembre|octobre|novembre|d[ée]cembre)\s+(?:19|20)\d{2})";

/// Calendar dates, either every date or only personal ones (birth, hiring).
#[derive(Debug, Clone)]
pub struct DateMatcher {
    personal_only: bool,
}

impl DateMatcher {
    /// Matches every date.
    pub fn any() -> Self {
        Self {
            personal_only: false,
        }
    }

    /// Matches dates introduced by a birth or hiring keyword.
    pub fn personal() -> Self {
        Self {
            personal_only: true,
        }
    }

    fn any_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(&format!(r"\b(?:{}|{})\b", DATE_NUMERIC, DATE_LONG))
                .expect("Valid date regex")
        });
        &PATTERN
    }

    fn personal_pattern() -> &'static Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(&format!(
                r"(?i:\bn[ée]e?\s+le|date\s+de\s+naissance|naissance|entr[ée]e?\s+le|date\s+d['’]entr[ée]e|anciennet[ée]|embauch[ée]e?\s+le)\s*:?\s*((?:{}|{}))\b",
                DATE_NUMERIC, DATE_LONG
            ))
            .expect("Valid date regex")
        });
        &PATTERN
    }
}

impl PatternMatcher for DateMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Date
    }

    fn pattern(&self) -> &Regex {
        if self.personal_only {
            Self::personal_pattern()
        } else {
            Self::any_pattern()
        }
    }

    fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        if self.personal_only {
            group_ranges(self.pattern(), text)
        } else {
            self.pattern().find_iter(text).map(|m| m.range()).collect()
        }
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.trim().to_lowercase())
    }
}

/// E-mail address.
#[derive(Debug, Clone, Default)]
pub struct EmailMatcher;

impl EmailMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for EmailMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Email
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"\b[\w.+\-]+@[\w\-]+(?:\.[\w\-]+)+\b").expect("Valid email regex")
        });
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.trim().to_lowercase())
    }
}

/// Booking or file reference announced by its keyword; must contain a digit.
#[derive(Debug, Clone, Default)]
pub struct ReferenceMatcher;

impl ReferenceMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for ReferenceMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Reference
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"\b(?i:r[ée]servation|confirmation|booking|dossier|r[ée]f[ée]rence|r[ée]f\.?)\s*(?i:n°|no|number|#)?\s*:?\s*([A-Z0-9][A-Z0-9\-]{4,19})\b",
            )
            .expect("Valid reference regex")
        });
        &PATTERN
    }

    fn find_ranges(&self, text: &str) -> Vec<Range<usize>> {
        group_ranges(self.pattern(), text)
            .into_iter()
            .filter(|r| self.is_valid(&text[r.clone()]))
            .collect()
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.trim().to_uppercase())
    }

    fn is_valid(&self, candidate: &str) -> bool {
        candidate.chars().any(|c| c.is_ascii_digit())
    }
}
