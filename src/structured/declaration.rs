//! Payroll declaration (DSN) anonymization.
//!
//! Every line is `code,value`, the value optionally wrapped in single
//! quotes. A code table gives the transform; unknown codes go through a few
//! generic detectors; address codes are masked last whatever happened before.

use super::{RunState, StructuredField, StructuredOutput, TransformCategory};
use crate::domain::{EmailMatcher, FrenchPhoneMatcher, PatternMatcher};
use crate::error::{AnonymizerError, AnonymizerResult};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use tracing::debug;

/// Value written over address fields.
pub const ADDRESS_PLACEHOLDER: &str = "ADRESSE_MASQUEE";
pub const EMAIL_PLACEHOLDER: &str = "email@anonyme.fr";
pub const PHONE_PLACEHOLDER: &str = "0000000000";
pub const DATE_PLACEHOLDER: &str = "XXXXXXXX";

/// Codes masked by the address pass.
pub const ADDRESS_CODES: [&str; 11] = [
    "S21.G00.30.008",
    "S21.G00.30.009",
    "S21.G00.30.010",
    "S21.G00.30.016",
    "S21.G00.30.017",
    "S21.G00.06.004",
    "S21.G00.06.005",
    "S21.G00.06.006",
    "S21.G00.11.003",
    "S21.G00.11.004",
    "S21.G00.11.005",
];

/// Code that opens an employee block (NIR).
pub const EMPLOYEE_ID_CODE: &str = "S21.G00.30.001";

/// Age bracket of a birth date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBucket {
    Under25,
    From25To29,
    From30To34,
    From35To39,
    From40To49,
    From50,
    Unknown,
}

impl AgeBucket {
    pub const ALL: [AgeBucket; 7] = [
        Self::Under25,
        Self::From25To29,
        Self::From30To34,
        Self::From35To39,
        Self::From40To49,
        Self::From50,
        Self::Unknown,
    ];

    pub fn for_age(age: i32) -> Self {
        match age {
            i32::MIN..=24 => Self::Under25,
            25..=29 => Self::From25To29,
            30..=34 => Self::From30To34,
            35..=39 => Self::From35To39,
            40..=49 => Self::From40To49,
            _ => Self::From50,
        }
    }

    /// Bucket of a `DDMMYYYY` birth date at `reference`.
    pub fn from_birth_date(value: &str, reference: NaiveDate) -> Self {
        let Ok(birth) = NaiveDate::parse_from_str(value.trim(), "%d%m%Y") else {
            return Self::Unknown;
        };
        if birth > reference {
            return Self::Unknown;
        }
        let mut age = reference.year() - birth.year();
        if (reference.month(), reference.day()) < (birth.month(), birth.day()) {
            age -= 1;
        }
        Self::for_age(age)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Under25 => "<25",
            Self::From25To29 => "25-29",
            Self::From30To34 => "30-34",
            Self::From35To39 => "35-39",
            Self::From40To49 => "40-49",
            Self::From50 => ">=50",
            Self::Unknown => "inconnu",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.label() == label)
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldRule {
    /// Salted hash; S21.G00.30.001 also opens the employee
    Hash,
    EmployeePseudonym,
    AgeBucket,
    Constant(&'static str),
}

fn rule_for(code: &str) -> Option<FieldRule> {
    let rule = match code {
        "S21.G00.30.001" | "S21.G00.30.020" => FieldRule::Hash,
        "S21.G00.30.002" | "S21.G00.30.003" | "S21.G00.30.004" | "S21.G00.30.019" => {
            FieldRule::EmployeePseudonym
        }
        "S21.G00.30.006" => FieldRule::AgeBucket,
        "S21.G00.30.007" => FieldRule::Constant("LIEU_MASQUE"),
        "S21.G00.30.018" | "S10.G00.02.004" => FieldRule::Constant(EMAIL_PLACEHOLDER),
        "S10.G00.01.003" => FieldRule::Constant("EMETTEUR_ANONYME"),
        "S10.G00.02.002" => FieldRule::Constant("CONTACT_ANONYME"),
        "S10.G00.02.005" => FieldRule::Constant(PHONE_PLACEHOLDER),
        "S21.G00.06.001" => FieldRule::Constant("000000000"),
        "S21.G00.11.001" => FieldRule::Constant("00000"),
        _ => return None,
    };
    Some(rule)
}

/// Rewrites a declaration file line by line.
#[derive(Debug, Clone, Default)]
pub struct DeclarationAnonymizer;

impl DeclarationAnonymizer {
    pub fn new() -> Self {
        Self
    }

    /// True when `line` looks like a declaration record (`S21.G00.30.001,...`).
    pub fn is_declaration_line(line: &str) -> bool {
        static LINE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"^S\d{2}\.G\d{2}\.\d{2}\.\d{3},").expect("Valid regex"));
        LINE.is_match(line.trim_start())
    }

    pub fn anonymize(&self, text: &str, run: &mut RunState) -> AnonymizerResult<StructuredOutput> {
        if !text.lines().any(Self::is_declaration_line) {
            return Err(AnonymizerError::StructuredFormat {
                format: "declaration".to_string(),
                reason: "no `code,value` record found".to_string(),
            });
        }

        let mut output = StructuredOutput {
            text: String::with_capacity(text.len()),
            fields: Vec::new(),
        };

        for (index, raw_line) in text.split_inclusive('\n').enumerate() {
            let content = raw_line.trim_end_matches(['\r', '\n']);
            let ending = &raw_line[content.len()..];

            let Some((code, raw_value)) = content.split_once(',') else {
                output.text.push_str(raw_line);
                continue;
            };
            let code = code.trim();
            let (value, quoted) = unquote(raw_value);

            let first = self.first_pass(code, value, run);
            let (new_value, transform) = if ADDRESS_CODES.contains(&code) {
                if value == ADDRESS_PLACEHOLDER {
                    (value.to_string(), TransformCategory::Passthrough)
                } else {
                    (ADDRESS_PLACEHOLDER.to_string(), TransformCategory::Constant)
                }
            } else {
                match first {
                    Some(result) => result,
                    None => {
                        output.text.push_str(raw_line);
                        continue;
                    }
                }
            };

            output.fields.push(StructuredField {
                record: index,
                code: code.to_string(),
                original: value.to_string(),
                transform,
            });
            output.text.push_str(code);
            output.text.push(',');
            if quoted {
                output.text.push('\'');
                output.text.push_str(&new_value);
                output.text.push('\'');
            } else {
                output.text.push_str(&new_value);
            }
            output.text.push_str(ending);
        }

        run.end_document();
        debug!(
            fields = output.fields.len(),
            rewritten = output.fields_rewritten(),
            "Declaration anonymized"
        );
        Ok(output)
    }

    /// Table transform, then generic detectors. `None` leaves the line as is.
    fn first_pass(
        &self,
        code: &str,
        value: &str,
        run: &mut RunState,
    ) -> Option<(String, TransformCategory)> {
        if value.trim().is_empty() {
            return None;
        }
        match rule_for(code) {
            Some(FieldRule::Hash) => Some(hash_field(code, value, run)),
            Some(FieldRule::EmployeePseudonym) => {
                static PSEUDONYM: Lazy<Regex> =
                    Lazy::new(|| Regex::new(r"^SALARIE\d{3,}$").expect("Valid regex"));
                if PSEUDONYM.is_match(value) {
                    Some((value.to_string(), TransformCategory::Passthrough))
                } else {
                    Some((run.current_employee(), TransformCategory::CounterPseudonym))
                }
            }
            Some(FieldRule::AgeBucket) => match AgeBucket::from_label(value) {
                Some(_) => Some((value.to_string(), TransformCategory::Passthrough)),
                None => Some((
                    AgeBucket::from_birth_date(value, run.reference_date()).to_string(),
                    TransformCategory::TrancheBucket,
                )),
            },
            Some(FieldRule::Constant(constant)) if value == constant => {
                Some((value.to_string(), TransformCategory::Passthrough))
            }
            Some(FieldRule::Constant(constant)) => {
                Some((constant.to_string(), TransformCategory::Constant))
            }
            None => generic(value),
        }
    }
}

fn unquote(raw: &str) -> (&str, bool) {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix('\'')
        .and_then(|v| v.strip_suffix('\''))
    {
        Some(inner) => (inner, true),
        None => (trimmed, false),
    }
}

/// Every non-empty value is hashed on its uppercased alphanumerics, so
/// `1-85-05-78-006-084-91` and `185057800608491` share a digest. Only digests
/// produced by this run pass through unchanged.
fn hash_field(code: &str, value: &str, run: &mut RunState) -> (String, TransformCategory) {
    let (result, transform) = if value.trim().is_empty() || run.is_own_digest(value) {
        (value.to_string(), TransformCategory::Passthrough)
    } else {
        let compact: String = value
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_uppercase();
        let key = if compact.is_empty() { value.trim().to_string() } else { compact };
        (run.record_hash(&key), TransformCategory::Hash)
    };

    if code == EMPLOYEE_ID_CODE {
        run.open_employee(&result);
    }
    (result, transform)
}

/// Detectors for codes outside the table: email, phone, 9/14-digit
/// identifier, 8-digit date.
fn generic(value: &str) -> Option<(String, TransformCategory)> {
    let trimmed = value.trim();
    let email = EmailMatcher::new();
    if email
        .pattern()
        .find(trimmed)
        .is_some_and(|m| m.range() == (0..trimmed.len()))
    {
        return Some((EMAIL_PLACEHOLDER.to_string(), TransformCategory::Constant));
    }

    let phone = FrenchPhoneMatcher::new();
    if phone
        .pattern()
        .find(trimmed)
        .is_some_and(|m| m.range() == (0..trimmed.len()))
        && phone.is_valid(trimmed)
        && trimmed != PHONE_PLACEHOLDER
    {
        return Some((PHONE_PLACEHOLDER.to_string(), TransformCategory::Constant));
    }

    let all_digits = !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit());
    if all_digits && matches!(trimmed.len(), 9 | 14) {
        return Some(("X".repeat(trimmed.len()), TransformCategory::Mask));
    }
    if all_digits
        && trimmed.len() == 8
        && NaiveDate::parse_from_str(trimmed, "%d%m%Y").is_ok()
    {
        return Some((DATE_PLACEHOLDER.to_string(), TransformCategory::Mask));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunState {
        RunState::with_salt(b"test-salt".to_vec())
            .with_reference_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
    }

    const DSN: &str = "S10.G00.01.003,'CABINET DURAND'\n\
S21.G00.06.001,'732829320'\n\
S21.G00.06.004,'12 RUE DES LILAS'\n\
S21.G00.30.001,'185057800608491'\n\
S21.G00.30.002,'DUPONT'\n\
S21.G00.30.004,'JEAN'\n\
S21.G00.30.006,'12031985'\n\
S21.G00.30.008,'5 AVENUE FOCH'\n\
S21.G00.30.018,'jean.dupont@example.fr'\n\
S21.G00.40.001,'01022020'\n\
S21.G00.51.011,'2500.00'\n\
S21.G00.30.001,'269077512345663'\n\
S21.G00.30.002,'MARTIN'\n";

    #[test]
    fn test_age_buckets() {
        let reference = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(AgeBucket::from_birth_date("12031985", reference), AgeBucket::From35To39);
        assert_eq!(AgeBucket::from_birth_date("28021985", reference), AgeBucket::From40To49);
        assert_eq!(AgeBucket::from_birth_date("01012005", reference), AgeBucket::Under25);
        assert_eq!(AgeBucket::from_birth_date("31131985", reference), AgeBucket::Unknown);
        assert_eq!(AgeBucket::for_age(50).label(), ">=50");
    }

    #[test]
    fn test_declaration_lines() {
        let mut state = run();
        let out = DeclarationAnonymizer::new().anonymize(DSN, &mut state).unwrap();
        let lines: Vec<&str> = out.text.lines().collect();
        let nir_hash = state.hash("185057800608491");

        assert_eq!(lines[0], "S10.G00.01.003,'EMETTEUR_ANONYME'");
        assert_eq!(lines[1], "S21.G00.06.001,'000000000'");
        assert_eq!(lines[2], "S21.G00.06.004,'ADRESSE_MASQUEE'");
        assert_eq!(lines[3], format!("S21.G00.30.001,'{}'", nir_hash));
        assert_eq!(lines[4], "S21.G00.30.002,'SALARIE001'");
        assert_eq!(lines[5], "S21.G00.30.004,'SALARIE001'");
        assert_eq!(lines[6], "S21.G00.30.006,'35-39'");
        assert_eq!(lines[7], "S21.G00.30.008,'ADRESSE_MASQUEE'");
        assert_eq!(lines[8], "S21.G00.30.018,'email@anonyme.fr'");
        assert_eq!(lines[9], "S21.G00.40.001,'XXXXXXXX'");
        assert_eq!(lines[10], "S21.G00.51.011,'2500.00'");
        assert_eq!(lines[12], "S21.G00.30.002,'SALARIE002'");
    }

    #[test]
    fn test_declaration_is_idempotent() {
        let anonymizer = DeclarationAnonymizer::new();
        let mut state = run();
        let once = anonymizer.anonymize(DSN, &mut state).unwrap();
        let twice = anonymizer.anonymize(&once.text, &mut state).unwrap();
        assert_eq!(once.text, twice.text);
        assert_eq!(twice.fields_rewritten(), 0);
    }

    #[test]
    fn test_same_nir_reuses_employee() {
        let text = "S21.G00.30.001,185057800608491\nS21.G00.30.002,DUPONT\n\
S21.G00.30.001,269077512345663\nS21.G00.30.002,MARTIN\n\
S21.G00.30.001,185057800608491\nS21.G00.30.004,JEAN\n";
        let mut state = run();
        let out = DeclarationAnonymizer::new().anonymize(text, &mut state).unwrap();
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines[1], "S21.G00.30.002,SALARIE001");
        assert_eq!(lines[3], "S21.G00.30.002,SALARIE002");
        assert_eq!(lines[5], "S21.G00.30.004,SALARIE001");
    }

    #[test]
    fn test_hash_rule_covers_every_value_shape() {
        let text = "S21.G00.30.001,'1-85-05-78-006-084-91'\nS21.G00.30.020,'123456789012'\n";
        let mut state = run();
        let out = DeclarationAnonymizer::new().anonymize(text, &mut state).unwrap();
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(
            lines[0],
            format!("S21.G00.30.001,'{}'", state.hash("185057800608491"))
        );
        assert_eq!(lines[1], format!("S21.G00.30.020,'{}'", state.hash("123456789012")));
        assert!(!out.text.contains("123456789012"));
    }

    #[test]
    fn test_foreign_hex_value_is_hashed() {
        let text = "S21.G00.30.020,'0123456789ab'\n";
        let mut fresh = run();
        let out = DeclarationAnonymizer::new().anonymize(text, &mut fresh).unwrap();
        assert_eq!(out.fields_rewritten(), 1);
        assert!(!out.text.contains("0123456789ab"));
    }

    #[test]
    fn test_generic_detectors() {
        assert_eq!(
            generic("01 23 45 67 89"),
            Some((PHONE_PLACEHOLDER.to_string(), TransformCategory::Constant))
        );
        assert_eq!(
            generic("73282932000074"),
            Some(("X".repeat(14), TransformCategory::Mask))
        );
        assert_eq!(generic("42"), None);
        assert_eq!(generic("20240131"), None);
    }

    #[test]
    fn test_not_a_declaration() {
        let mut state = run();
        assert!(DeclarationAnonymizer::new()
            .anonymize("hello,world\n", &mut state)
            .is_err());
    }
}
