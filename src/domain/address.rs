//! Postal address detection.

use super::{PatternMatcher, PiiCategory};
use once_cell::sync::Lazy;
use regex::Regex;

/// Street-type keywords that make a candidate a real address.
pub const STREET_KEYWORDS: &[&str] = &[
    "rue",
    "avenue",
    "av.",
    "boulevard",
    "bd",
    "chemin",
    "impasse",
    "allée",
    "allee",
    "place",
    "route",
    "quai",
    "cours",
    "square",
    "lieu-dit",
    "résidence",
];

/// True when `text` contains a street-type keyword as a whole word.
pub fn has_street_keyword(text: &str) -> bool {
    static PATTERN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"(?i)(?:^|[^\p{L}])(?:rue|avenue|av\.|boulevard|bd|chemin|impasse|all[ée]e|place|route|quai|cours|square|lieu-dit|r[ée]sidence)(?:$|[^\p{L}])",
        )
        .expect("Valid regex")
    });
    PATTERN.is_match(text)
}

/// Numbered street address: `12 bis rue des Lilas`.
#[derive(Debug, Clone, Default)]
pub struct StreetAddressMatcher;

impl StreetAddressMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for StreetAddressMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Address
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(
                r"(?i)\b\d{1,4}(?:\s?(?:bis|ter|b))?,?\s+(?:rue|avenue|av\.|boulevard|bd|chemin|impasse|all[ée]e|place|route|quai|cours|square)\b(?:\s+(?:d[eu]s?|la|le|l['’]|d['’])?\s*[\p{L}'’\-]+){1,4}",
            )
            .expect("Valid address regex")
        });
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        (!collapsed.is_empty()).then(|| collapsed.to_lowercase())
    }
}

/// Postal code followed by an upper-case city: `75008 PARIS`.
#[derive(Debug, Clone, Default)]
pub struct PostalCityMatcher;

impl PostalCityMatcher {
    pub fn new() -> Self {
        Self
    }
}

impl PatternMatcher for PostalCityMatcher {
    fn category(&self) -> PiiCategory {
        PiiCategory::Address
    }

    fn pattern(&self) -> &Regex {
        static PATTERN: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"\b(?:0[1-9]|[1-8]\d|9[0-8]|2[AB])\d{3}\s+[A-ZÉÈÀÂÎÔÛÇ][A-ZÉÈÀÂÎÔÛÇ\-']+(?:[ \-][A-ZÉÈÀÂÎÔÛÇ][A-ZÉÈÀÂÎÔÛÇ\-']+)*\b")
                .expect("Valid postal regex")
        });
        &PATTERN
    }

    fn normalize(&self, text: &str) -> Option<String> {
        Some(text.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_street_address() {
        let matcher = StreetAddressMatcher::new();
        let found = matcher.extract_all("Domicile : 12 bis rue des Lilas, 69003 LYON");
        assert_eq!(found, vec!["12 bis rue des Lilas"]);
    }

    #[test]
    fn test_postal_city() {
        let matcher = PostalCityMatcher::new();
        assert_eq!(matcher.extract_all("69003 LYON"), vec!["69003 LYON"]);
        assert!(matcher.extract_all("Total 12345 euros").is_empty());
    }

    #[test]
    fn test_street_keyword() {
        assert!(has_street_keyword("3 Allée des Pins"));
        assert!(has_street_keyword("BD HAUSSMANN"));
        assert!(!has_street_keyword("Bruneau"));
        assert!(!has_street_keyword("Marseille"));
    }
}
