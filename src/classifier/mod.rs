//! Hybrid PII classification of free text.
//!
//! Each span goes through the ruleset of its document type: pre-model
//! pattern rules, the entity model on a masked working copy, post-model
//! rules, then suppression. Surviving entities that overlap are merged so
//! that each one maps to exactly one redaction operation.

pub mod doctype;
pub mod model;
pub mod replacement;
pub mod ruleset;

pub use doctype::{DocumentType, DocumentTypeClassifier};
pub use model::{
    CommandEntityModel, DetectionError, EntityModel, LexiconEntityModel, ModelEntity,
    NullEntityModel,
};
pub use replacement::{ReplacementRegistry, ReplacementStrategy};
pub use ruleset::Ruleset;

use crate::domain::{char_range, Origin, PiiEntity, SuppressionRules, TextSpan};
use std::collections::HashMap;
use std::ops::Range;
use tracing::{debug, warn};

/// Char written over pre-model matches in the working copy.
const WORKING_MASK: char = '\u{2588}';

/// Classifies text spans into PII entities.
pub struct EntityClassifier {
    model: Box<dyn EntityModel>,
    suppression: SuppressionRules,
    rulesets: HashMap<DocumentType, Ruleset>,
}

impl EntityClassifier {
    pub fn new(model: Box<dyn EntityModel>, suppression: SuppressionRules) -> Self {
        let rulesets = DocumentType::ALL
            .into_iter()
            .map(|t| (t, Ruleset::for_document(t)))
            .collect();
        Self {
            model,
            suppression,
            rulesets,
        }
    }

    /// Pattern rules and default allow-list, no model.
    pub fn pattern_only() -> Self {
        Self::new(Box::new(NullEntityModel), SuppressionRules::default())
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    pub fn suppression(&self) -> &SuppressionRules {
        &self.suppression
    }

    /// Classifies one span. Suppressed candidates are returned with their
    /// decision; the others are merged and do not overlap.
    pub fn classify_span(&self, span: &TextSpan, document_type: DocumentType) -> Vec<PiiEntity> {
        self.classify_text(&span.text, document_type)
    }

    pub fn classify_text(&self, text: &str, document_type: DocumentType) -> Vec<PiiEntity> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let original: Vec<char> = text.chars().collect();
        let mut working = original.clone();
        let mut candidates = Vec::new();

        let ruleset = match self.rulesets.get(&document_type) {
            Some(r) => r,
            None => return Vec::new(),
        };

        for rule in &ruleset.pre_model {
            let current: String = working.iter().collect();
            let ranges: Vec<Range<usize>> = rule
                .find_ranges(&current)
                .into_iter()
                .map(|r| char_range(&current, r))
                .collect();
            for range in ranges {
                let matched = slice(&original, &range);
                let confidence = rule.confidence(&matched);
                candidates.push(
                    PiiEntity::new(rule.category(), Origin::Pattern, range.clone(), matched)
                        .with_confidence(confidence),
                );
                for c in &mut working[range] {
                    *c = WORKING_MASK;
                }
            }
        }

        let masked: String = working.iter().collect();
        match self.model.classify(&masked) {
            Ok(found) => {
                for entity in found {
                    let Some(category) = entity.category() else {
                        continue;
                    };
                    let end = entity.end.min(working.len());
                    if entity.start >= end {
                        continue;
                    }
                    let range = entity.start..end;
                    if working[range.clone()]
                        .iter()
                        .all(|c| *c == WORKING_MASK || c.is_whitespace())
                    {
                        continue;
                    }
                    candidates.push(
                        PiiEntity::new(category, Origin::Model, range.clone(), slice(&original, &range))
                            .with_confidence(entity.score),
                    );
                }
            }
            Err(e) => {
                warn!(model = self.model.name(), error = %e, "Entity model failed, using patterns only");
            }
        }

        for rule in &ruleset.post_model {
            for r in rule.find_ranges(&masked) {
                let range = char_range(&masked, r);
                let matched = slice(&original, &range);
                let confidence = rule.confidence(&matched);
                candidates.push(
                    PiiEntity::new(rule.category(), Origin::Pattern, range.clone(), matched)
                        .with_confidence(confidence),
                );
            }
        }

        self.suppression.apply(text, &mut candidates);
        for candidate in &candidates {
            debug!(
                category = candidate.category.label(),
                origin = ?candidate.origin,
                suppression = ?candidate.suppression,
                "Candidate"
            );
        }

        let (suppressed, kept): (Vec<_>, Vec<_>) =
            candidates.into_iter().partition(PiiEntity::is_suppressed);
        let mut result = merge_overlapping(kept, &original);
        result.extend(suppressed);
        result.sort_by_key(|e| (e.range.start, e.is_suppressed()));
        result
    }
}

impl std::fmt::Debug for EntityClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityClassifier")
            .field("model", &self.model.name())
            .field("suppression", &self.suppression)
            .finish()
    }
}

fn slice(chars: &[char], range: &Range<usize>) -> String {
    chars[range.start.min(chars.len())..range.end.min(chars.len())]
        .iter()
        .collect()
}

/// Unions overlapping entities. The merged entity keeps the category of the
/// earliest one (longest on ties).
fn merge_overlapping(mut entities: Vec<PiiEntity>, original: &[char]) -> Vec<PiiEntity> {
    entities.sort_by(|a, b| {
        a.range
            .start
            .cmp(&b.range.start)
            .then(b.range.len().cmp(&a.range.len()))
    });

    let mut merged: Vec<PiiEntity> = Vec::with_capacity(entities.len());
    for entity in entities {
        match merged.last_mut() {
            Some(last) if entity.range.start < last.range.end => {
                if entity.range.end > last.range.end {
                    last.range.end = entity.range.end;
                    last.text = slice(original, &last.range);
                }
                last.confidence = last.confidence.max(entity.confidence);
            }
            _ => merged.push(entity),
        }
    }
    merged
}
