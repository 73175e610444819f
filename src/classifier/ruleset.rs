//! Ordered pattern rules per document type.

use super::DocumentType;
use crate::domain::{
    CivilityNameMatcher, CompanyMatcher, DateMatcher, EmailMatcher, FrenchPhoneMatcher,
    MatriculeMatcher, NafMatcher, NirMatcher, PatternMatcher, PostalCityMatcher,
    ReferenceMatcher, SalutationNameMatcher, SiretMatcher, StreetAddressMatcher, UrssafMatcher,
};

/// Pattern rules applied around the entity model.
///
/// `pre_model` matches are masked in the working copy before the model runs;
/// `post_model` rules run on that masked copy afterwards.
pub struct Ruleset {
    pub document_type: DocumentType,
    pub pre_model: Vec<Box<dyn PatternMatcher>>,
    pub post_model: Vec<Box<dyn PatternMatcher>>,
}

impl Ruleset {
    pub fn for_document(document_type: DocumentType) -> Self {
        let (pre_model, post_model): (Vec<Box<dyn PatternMatcher>>, Vec<Box<dyn PatternMatcher>>) =
            match document_type {
                DocumentType::Payslip => (
                    vec![
                        Box::new(CivilityNameMatcher::new()),
                        Box::new(StreetAddressMatcher::new()),
                        Box::new(PostalCityMatcher::new()),
                        Box::new(SiretMatcher::new()),
                        Box::new(NirMatcher::new()),
                        Box::new(NafMatcher::new()),
                        Box::new(UrssafMatcher::new()),
                        Box::new(DateMatcher::personal()),
                        Box::new(EmailMatcher::new()),
                        Box::new(FrenchPhoneMatcher::new()),
                    ],
                    vec![Box::new(MatriculeMatcher::new())],
                ),
                DocumentType::EmploymentContract => (
                    vec![
                        Box::new(CivilityNameMatcher::new()),
                        Box::new(CompanyMatcher::new()),
                        Box::new(StreetAddressMatcher::new()),
                        Box::new(PostalCityMatcher::new()),
                        Box::new(SiretMatcher::new()),
                        Box::new(NirMatcher::new()),
                        Box::new(DateMatcher::personal()),
                        Box::new(EmailMatcher::new()),
                        Box::new(FrenchPhoneMatcher::new()),
                    ],
                    vec![Box::new(MatriculeMatcher::new())],
                ),
                DocumentType::MissionLetter => (
                    vec![
                        Box::new(CivilityNameMatcher::new()),
                        Box::new(SalutationNameMatcher::new()),
                        Box::new(CompanyMatcher::new()),
                        Box::new(StreetAddressMatcher::new()),
                        Box::new(PostalCityMatcher::new()),
                        Box::new(SiretMatcher::new()),
                        Box::new(EmailMatcher::new()),
                        Box::new(FrenchPhoneMatcher::new()),
                    ],
                    vec![Box::new(NafMatcher::new())],
                ),
                DocumentType::Reservation => (
                    vec![
                        Box::new(CivilityNameMatcher::new()),
                        Box::new(EmailMatcher::new()),
                        Box::new(FrenchPhoneMatcher::new()),
                        Box::new(ReferenceMatcher::new()),
                        Box::new(StreetAddressMatcher::new()),
                        Box::new(PostalCityMatcher::new()),
                    ],
                    vec![Box::new(DateMatcher::any())],
                ),
            };

        Self {
            document_type,
            pre_model,
            post_model,
        }
    }
}

impl std::fmt::Debug for Ruleset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |rules: &[Box<dyn PatternMatcher>]| {
            rules.iter().map(|r| r.category().label()).collect::<Vec<_>>()
        };
        f.debug_struct("Ruleset")
            .field("document_type", &self.document_type)
            .field("pre_model", &names(&self.pre_model))
            .field("post_model", &names(&self.post_model))
            .finish()
    }
}
