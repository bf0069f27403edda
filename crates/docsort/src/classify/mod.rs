//! Document attribution: condition evaluation, feature fingerprints,
//! similarity voting, and the suggestion service tying them together.
//!
//! The engine is pure and synchronous; rules and the correction corpus arrive
//! as in-memory collections owned by the caller, so independent `suggest`
//! passes can run in parallel without any internal locking.

pub mod backfill;
pub mod conditions;
pub mod domain;
pub mod engine;
pub mod features;
pub mod repository;
pub mod router;
pub mod rules;
pub mod service;
pub mod similarity;

#[cfg(test)]
mod tests;

pub use backfill::{BackfillImportError, CorrectionBackfillImporter};
pub use conditions::{Condition, ConditionOperator, ConditionOutcome, FieldKind};
pub use domain::{
    AttributeField, AttributeValue, Correction, CorrectionSource, DocumentId, DocumentRecord,
    Suggestion, Vote, VoteSource,
};
pub use engine::{AttributionEngine, EngineConfig, EngineConfigError};
pub use features::{AmountRange, FeatureExtractor, FeatureSet, FileTypeClass};
pub use repository::{AuditError, AuditEvent, AuditSink, ClassificationStore, StoreError};
pub use router::classification_router;
pub use rules::{AttributionRule, RuleAction, RuleCondition, RuleMatch};
pub use service::{
    AppliedSuggestion, ClassificationService, RuleTestResult, ServiceError, SkipReason,
    SkippedField, SuggestionReport,
};
pub use similarity::{SimilarityScorer, SimilarityWeights, WeightError};
