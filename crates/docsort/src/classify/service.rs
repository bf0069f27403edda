use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::domain::{
    AttributeField, AttributeValue, Correction, CorrectionSource, DocumentId, DocumentRecord,
    Suggestion,
};
use super::engine::{AttributionEngine, EngineConfig, EngineConfigError};
use super::repository::{AuditError, AuditEvent, AuditSink, ClassificationStore, StoreError};
use super::rules::{self, AttributionRule, GroupTrace, RuleAction};

/// Service composing the attribution engine with the correction store and the
/// audit trail. Owns no document state; callers persist accepted values.
pub struct ClassificationService<S, A> {
    store: Arc<S>,
    audit: Arc<A>,
    engine: Arc<AttributionEngine>,
}

impl<S, A> ClassificationService<S, A>
where
    S: ClassificationStore + 'static,
    A: AuditSink + 'static,
{
    pub fn new(store: Arc<S>, audit: Arc<A>, config: EngineConfig) -> Result<Self, EngineConfigError> {
        let engine = Arc::new(AttributionEngine::new(config)?);
        Ok(Self {
            store,
            audit,
            engine,
        })
    }

    pub fn engine(&self) -> &AttributionEngine {
        &self.engine
    }

    /// Run the full suggestion pass for one document: fetch active rules and
    /// the bounded correction corpus, merge rule and similarity votes, then
    /// sort winners into suggested / auto-applied / skipped buckets.
    pub fn suggest_for(
        &self,
        document: &DocumentRecord,
        auto_apply: bool,
    ) -> Result<SuggestionReport, ServiceError> {
        let config = self.engine.config().clone();
        let rules = self.store.active_rules()?;

        let mut corpus = Vec::new();
        for field in AttributeField::ALL {
            corpus.extend(self.store.recent_corrections(field, config.corpus_window)?);
        }

        let ranked = self.engine.suggest(document, &rules, &corpus);

        let mut report = SuggestionReport {
            document_id: document.id,
            suggestions: Vec::new(),
            auto_applied: Vec::new(),
            skipped: Vec::new(),
        };

        for suggestion in ranked {
            if let Some(current) = assigned_value(document, suggestion.field) {
                report.skipped.push(SkippedField {
                    field: suggestion.field,
                    reason: SkipReason::AlreadyAssigned { current },
                });
                continue;
            }

            if suggestion.confidence < config.suggestion_threshold {
                report.skipped.push(SkippedField {
                    field: suggestion.field,
                    reason: SkipReason::ConfidenceTooLow {
                        confidence: suggestion.confidence,
                    },
                });
                continue;
            }

            if auto_apply && suggestion.confidence >= config.auto_apply_threshold {
                self.apply_suggestion(document, &suggestion)?;
                report.auto_applied.push(AppliedSuggestion {
                    field: suggestion.field,
                    value: suggestion.value,
                    confidence: suggestion.confidence,
                });
                continue;
            }

            report.suggestions.push(suggestion);
        }

        Ok(report)
    }

    /// Record a confirmed attribute value as ground truth for future
    /// similarity voting, and leave an audit trail entry.
    pub fn record_correction(
        &self,
        document: &DocumentRecord,
        field: AttributeField,
        new_value: AttributeValue,
        source: CorrectionSource,
        confidence: f64,
    ) -> Result<Correction, ServiceError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(ServiceError::InvalidConfidence { value: confidence });
        }

        let correction = Correction {
            document_id: document.id,
            field,
            old_value: assigned_value(document, field),
            new_value: new_value.clone(),
            source,
            confidence,
            corrected_at: Utc::now().naive_utc(),
            features: self.engine.extractor().extract(document),
        };

        self.store.record_correction(correction.clone())?;
        self.audit.publish(AuditEvent {
            document_id: document.id,
            field,
            old_value: correction.old_value.clone(),
            new_value,
            change_source: source,
            detail: "correction recorded".to_string(),
        })?;

        Ok(correction)
    }

    /// Dry-run one rule against a batch of documents without casting votes or
    /// touching the store. Used by the rule editor's preview.
    pub fn test_rule(
        &self,
        rule: &AttributionRule,
        documents: &[DocumentRecord],
    ) -> Vec<RuleTestResult> {
        documents
            .iter()
            .map(|document| {
                let evaluation = rules::evaluate_rule(rule, document);
                RuleTestResult {
                    document_id: document.id,
                    document_title: document.title.clone(),
                    matched: evaluation.matched,
                    groups: evaluation.groups,
                    would_apply: if evaluation.matched {
                        rule.actions.clone()
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect()
    }

    fn apply_suggestion(
        &self,
        document: &DocumentRecord,
        suggestion: &Suggestion,
    ) -> Result<(), ServiceError> {
        let correction = Correction {
            document_id: document.id,
            field: suggestion.field,
            old_value: assigned_value(document, suggestion.field),
            new_value: suggestion.value.clone(),
            source: CorrectionSource::Ml,
            confidence: suggestion.confidence,
            corrected_at: Utc::now().naive_utc(),
            features: self.engine.extractor().extract(document),
        };

        self.store.record_correction(correction)?;
        self.audit.publish(AuditEvent {
            document_id: document.id,
            field: suggestion.field,
            old_value: None,
            new_value: suggestion.value.clone(),
            change_source: CorrectionSource::Ml,
            detail: format!(
                "auto-applied with {:.0}% confidence from {} supporting votes",
                suggestion.confidence * 100.0,
                suggestion.supporting_votes.len()
            ),
        })?;

        Ok(())
    }
}

/// Current value of a predicted field on the document; tags are additive and
/// never considered "already assigned".
fn assigned_value(document: &DocumentRecord, field: AttributeField) -> Option<AttributeValue> {
    match field {
        AttributeField::Correspondent => document.correspondent_id.map(AttributeValue::Id),
        AttributeField::DocumentType => document.document_type_id.map(AttributeValue::Id),
        AttributeField::Tag => None,
    }
}

/// Outcome of one suggestion pass.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionReport {
    pub document_id: Option<DocumentId>,
    pub suggestions: Vec<Suggestion>,
    pub auto_applied: Vec<AppliedSuggestion>,
    pub skipped: Vec<SkippedField>,
}

/// Suggestion the service recorded on its own authority.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedSuggestion {
    pub field: AttributeField,
    pub value: AttributeValue,
    pub confidence: f64,
}

/// Field the pass intentionally produced nothing for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedField {
    pub field: AttributeField,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    AlreadyAssigned { current: AttributeValue },
    ConfidenceTooLow { confidence: f64 },
}

/// Result of a rule dry-run against one document.
#[derive(Debug, Clone, Serialize)]
pub struct RuleTestResult {
    pub document_id: Option<DocumentId>,
    pub document_title: Option<String>,
    pub matched: bool,
    pub groups: Vec<GroupTrace>,
    pub would_apply: Vec<RuleAction>,
}

/// Error raised by the classification service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] EngineConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("correction confidence must lie in [0, 1], got {value}")]
    InvalidConfidence { value: f64 },
}
