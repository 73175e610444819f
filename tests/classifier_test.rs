//! Document typing, hybrid entity detection and suppression.

use anonymiseur::classifier::{
    DetectionError, DocumentType, DocumentTypeClassifier, EntityClassifier, EntityModel,
    LexiconEntityModel, ModelEntity,
};
use anonymiseur::domain::{AllowList, Origin, PiiCategory, Suppression, SuppressionRules};
use anyhow::Result;

fn redacted(entities: &[anonymiseur::domain::PiiEntity]) -> Vec<(PiiCategory, String)> {
    entities
        .iter()
        .filter(|e| !e.is_suppressed())
        .map(|e| (e.category, e.text.clone()))
        .collect()
}

/// Returns fixed labels whatever the input.
struct ScriptedModel(Vec<ModelEntity>);

impl EntityModel for ScriptedModel {
    fn classify(&self, _text: &str) -> Result<Vec<ModelEntity>, DetectionError> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct BrokenModel;

impl EntityModel for BrokenModel {
    fn classify(&self, _text: &str) -> Result<Vec<ModelEntity>, DetectionError> {
        Err(DetectionError::Unavailable("connection reset".to_string()))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn model_entity(label: &str, start: usize, end: usize) -> ModelEntity {
    ModelEntity {
        label: label.to_string(),
        start,
        end,
        text: String::new(),
        score: 0.9,
    }
}

#[test]
fn test_document_types() {
    let classifier = DocumentTypeClassifier::new();
    let cases = [
        ("BULLETIN DE PAIE\nSalaire de base", DocumentType::Payslip),
        ("Contrat de travail a duree determinee", DocumentType::EmploymentContract),
        ("Chère Madame,\nNous avons le plaisir", DocumentType::MissionLetter),
        ("Confirmation de réservation - Hôtel du Parc", DocumentType::Reservation),
        ("", DocumentType::Payslip),
    ];
    for (text, expected) in cases {
        assert_eq!(classifier.classify(text), expected, "text: {:?}", text);
    }
}

#[test]
fn test_provider_address_is_never_redacted() {
    let classifier = EntityClassifier::pattern_only();
    let entities = classifier.classify_text("XPERT-IA, 3 avenue Magellan", DocumentType::Payslip);
    assert!(redacted(&entities).is_empty());
    assert!(entities
        .iter()
        .any(|e| e.suppression == Suppression::AllowListed));

    let other = classifier.classify_text("Siege : 3 avenue Foch", DocumentType::Payslip);
    assert_eq!(redacted(&other).len(), 1);
}

#[test]
fn test_custom_allow_list() -> Result<()> {
    let allow = AllowList::new(&["Paul DURAND"], &[])?;
    let classifier = EntityClassifier::new(
        Box::new(anonymiseur::classifier::NullEntityModel),
        SuppressionRules::new(allow),
    );
    let text = "Expert-comptable : Monsieur Paul DURAND";
    assert!(redacted(&classifier.classify_text(text, DocumentType::Payslip)).is_empty());

    let entities = classifier.classify_text("Salarie : Monsieur Jean DUPONT", DocumentType::Payslip);
    assert_eq!(redacted(&entities).len(), 1);
    assert_eq!(redacted(&entities)[0].0, PiiCategory::Name);
    Ok(())
}

#[test]
fn test_amounts_are_not_pii() {
    let classifier = EntityClassifier::pattern_only();
    for line in [
        "Salaire de base 2 450,00 EUR",
        "Net a payer avant impot 1 910,37",
        "Cotisations 512,80 €",
    ] {
        assert!(
            redacted(&classifier.classify_text(line, DocumentType::Payslip)).is_empty(),
            "{}",
            line
        );
    }
}

#[test]
fn test_model_entities_are_merged_with_patterns() {
    let text = "Suivi par Bernard Lefebvre, jean.dupont@exemple.fr";
    let model = ScriptedModel(vec![model_entity("PER", 10, 26)]);
    let classifier = EntityClassifier::new(Box::new(model), SuppressionRules::default());
    let entities = classifier.classify_text(text, DocumentType::MissionLetter);

    let kept = redacted(&entities);
    assert_eq!(kept.len(), 2);
    assert!(kept.contains(&(PiiCategory::Name, "Bernard Lefebvre".to_string())));
    assert!(kept.contains(&(PiiCategory::Email, "jean.dupont@exemple.fr".to_string())));
    assert!(entities
        .iter()
        .any(|e| e.origin == Origin::Model && e.category == PiiCategory::Name));
}

#[test]
fn test_model_address_without_street_is_suppressed() {
    let text = "Bureau de Marseille";
    let model = ScriptedModel(vec![model_entity("ADRESSE", 10, 19)]);
    let classifier = EntityClassifier::new(Box::new(model), SuppressionRules::default());
    let entities = classifier.classify_text(text, DocumentType::Payslip);
    assert!(redacted(&entities).is_empty());
    assert!(entities
        .iter()
        .any(|e| e.suppression == Suppression::NotAnAddress));
}

#[test]
fn test_failing_model_keeps_pattern_detection() {
    let classifier = EntityClassifier::new(Box::new(BrokenModel), SuppressionRules::default());
    let entities = classifier.classify_text(
        "N SS : 1 85 05 78 006 084 91",
        DocumentType::Payslip,
    );
    assert_eq!(redacted(&entities).len(), 1);
    assert_eq!(redacted(&entities)[0].0, PiiCategory::Nir);
}

#[test]
fn test_lexicon_model() -> Result<()> {
    let model = LexiconEntityModel::from_toml_str(
        r#"
        [[entry]]
        label = "NOM"
        terms = ["Lefebvre"]
        "#,
    )?;
    let classifier = EntityClassifier::new(Box::new(model), SuppressionRules::default());
    let entities = classifier.classify_text(
        "Dossier suivi par LEFEBVRE depuis 2019",
        DocumentType::MissionLetter,
    );
    assert_eq!(
        redacted(&entities),
        vec![(PiiCategory::Name, "LEFEBVRE".to_string())]
    );
    Ok(())
}
