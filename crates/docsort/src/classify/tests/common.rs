use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::classify::domain::{
    AttributeField, AttributeValue, Correction, CorrectionSource, DocumentId, DocumentRecord,
    Suggestion,
};
use crate::classify::engine::EngineConfig;
use crate::classify::features::FeatureExtractor;
use crate::classify::repository::{
    AuditError, AuditEvent, AuditSink, ClassificationStore, StoreError,
};
use crate::classify::router::classification_router;
use crate::classify::rules::{AttributionRule, RuleAction, RuleCondition};
use crate::classify::conditions::{Condition, ConditionOperator, FieldKind};
use crate::classify::service::ClassificationService;

pub(super) fn fixed_time(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, day)
        .expect("valid date")
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

/// Incoming invoice with correspondent and type still unassigned.
pub(super) fn invoice_document() -> DocumentRecord {
    DocumentRecord {
        id: Some(DocumentId(100)),
        title: Some("Facture consulting juin".to_string()),
        amount: Some(750.0),
        currency: Some("EUR".to_string()),
        content: Some(
            "Facture pour services de consulting informatique. Prestation consulting \
             mensuelle, maintenance serveurs et infogérance réseau."
                .to_string(),
        ),
        mime_type: Some("application/pdf".to_string()),
        filename: Some("facture-juin.pdf".to_string()),
        tag_ids: [3].into_iter().collect(),
        doc_date: NaiveDate::from_ymd_opt(2025, 6, 10),
        ..DocumentRecord::default()
    }
}

/// Already-classified sibling of the invoice above, used to seed the corpus.
pub(super) fn classified_invoice(id: i64, correspondent: i64) -> DocumentRecord {
    DocumentRecord {
        id: Some(DocumentId(id)),
        title: Some("Facture consulting mai".to_string()),
        correspondent_id: Some(correspondent),
        document_type_id: Some(3),
        amount: Some(780.0),
        content: Some(
            "Facture consulting informatique. Prestation mensuelle, maintenance serveurs."
                .to_string(),
        ),
        mime_type: Some("application/pdf".to_string()),
        filename: Some("facture-mai.pdf".to_string()),
        tag_ids: [3].into_iter().collect(),
        doc_date: NaiveDate::from_ymd_opt(2025, 5, 12),
        ..DocumentRecord::default()
    }
}

/// Correction derived from a classified document, fingerprint included.
pub(super) fn correction_from(
    document: &DocumentRecord,
    field: AttributeField,
    value: AttributeValue,
    day: u32,
) -> Correction {
    Correction {
        document_id: document.id,
        field,
        old_value: None,
        new_value: value,
        source: CorrectionSource::Manual,
        confidence: 1.0,
        corrected_at: fixed_time(day, 9),
        features: FeatureExtractor::default().extract(document),
    }
}

pub(super) fn condition(field: FieldKind, operator: ConditionOperator, value: &str) -> Condition {
    Condition {
        field,
        field_name: None,
        operator,
        value: value.to_string(),
    }
}

pub(super) fn rule(id: i64, name: &str, conditions: Vec<Condition>, actions: Vec<RuleAction>) -> AttributionRule {
    AttributionRule {
        id,
        name: name.to_string(),
        description: None,
        priority: 100,
        active: true,
        stop_on_match: false,
        conditions: conditions
            .into_iter()
            .map(|condition| RuleCondition {
                group: 0,
                condition,
            })
            .collect(),
        actions,
    }
}

pub(super) fn engine_config() -> EngineConfig {
    EngineConfig::default()
}

#[derive(Default)]
pub(super) struct MemoryStore {
    rules: Mutex<Vec<AttributionRule>>,
    corrections: Mutex<Vec<Correction>>,
}

impl MemoryStore {
    pub(super) fn with_rules(rules: Vec<AttributionRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            corrections: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn seed_corrections(&self, corrections: Vec<Correction>) {
        self.corrections
            .lock()
            .expect("store mutex poisoned")
            .extend(corrections);
    }

    pub(super) fn corrections(&self) -> Vec<Correction> {
        self.corrections
            .lock()
            .expect("store mutex poisoned")
            .clone()
    }
}

impl ClassificationStore for MemoryStore {
    fn active_rules(&self) -> Result<Vec<AttributionRule>, StoreError> {
        Ok(self.rules.lock().expect("store mutex poisoned").clone())
    }

    fn recent_corrections(
        &self,
        field: AttributeField,
        limit: usize,
    ) -> Result<Vec<Correction>, StoreError> {
        let mut matching: Vec<Correction> = self
            .corrections
            .lock()
            .expect("store mutex poisoned")
            .iter()
            .filter(|correction| correction.field == field)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.corrected_at.cmp(&a.corrected_at));
        matching.truncate(limit);
        Ok(matching)
    }

    fn record_correction(&self, correction: Correction) -> Result<(), StoreError> {
        self.corrections
            .lock()
            .expect("store mutex poisoned")
            .push(correction);
        Ok(())
    }
}

pub(super) struct UnavailableStore;

impl ClassificationStore for UnavailableStore {
    fn active_rules(&self) -> Result<Vec<AttributionRule>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn recent_corrections(
        &self,
        _field: AttributeField,
        _limit: usize,
    ) -> Result<Vec<Correction>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn record_correction(&self, _correction: Correction) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

#[derive(Default)]
pub(super) struct MemoryAudit {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAudit {
    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAudit {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(super) fn build_service(
    rules: Vec<AttributionRule>,
) -> (
    ClassificationService<MemoryStore, MemoryAudit>,
    Arc<MemoryStore>,
    Arc<MemoryAudit>,
) {
    let store = Arc::new(MemoryStore::with_rules(rules));
    let audit = Arc::new(MemoryAudit::default());
    let service = ClassificationService::new(store.clone(), audit.clone(), engine_config())
        .expect("default config is valid");
    (service, store, audit)
}

pub(super) fn classification_router_with_service(
    service: ClassificationService<MemoryStore, MemoryAudit>,
) -> axum::Router {
    classification_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn suggestion_for(suggestions: &[Suggestion], field: AttributeField) -> Option<&Suggestion> {
    suggestions.iter().find(|suggestion| suggestion.field == field)
}
