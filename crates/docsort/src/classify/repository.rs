use serde::Serialize;

use super::domain::{
    AttributeField, AttributeValue, Correction, CorrectionSource, DocumentId,
};
use super::rules::AttributionRule;

/// Storage abstraction over rules and the correction log so the engine can be
/// exercised against in-memory fixtures and the web layer can bring its own
/// database. All reads are snapshots; the engine never holds the store open.
pub trait ClassificationStore: Send + Sync {
    fn active_rules(&self) -> Result<Vec<AttributionRule>, StoreError>;

    /// Most recent corrections for one predicted field, newest first,
    /// bounded by `limit`.
    fn recent_corrections(
        &self,
        field: AttributeField,
        limit: usize,
    ) -> Result<Vec<Correction>, StoreError>;

    fn record_correction(&self, correction: Correction) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("classification store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt record in classification store: {0}")]
    Corrupt(String),
}

/// Outbound audit hook; every recorded or auto-applied change lands here so
/// the product can render a classification history.
pub trait AuditSink: Send + Sync {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError>;
}

/// One entry of the classification audit trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub document_id: Option<DocumentId>,
    pub field: AttributeField,
    pub old_value: Option<AttributeValue>,
    pub new_value: AttributeValue,
    pub change_source: CorrectionSource,
    pub detail: String,
}

/// Audit dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}
