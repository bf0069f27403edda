use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use docsort::classify::{
    AttributeField, AttributionRule, AuditError, AuditEvent, AuditSink, ClassificationStore,
    Condition, ConditionOperator, Correction, EngineConfig, FieldKind, RuleAction, RuleCondition,
    StoreError,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Rule and correction storage for a single-process deployment. Production
/// installs swap this for a database-backed implementation of the same trait.
#[derive(Default)]
pub(crate) struct InMemoryClassificationStore {
    rules: Mutex<Vec<AttributionRule>>,
    corrections: Mutex<Vec<Correction>>,
}

impl InMemoryClassificationStore {
    pub(crate) fn with_rules(rules: Vec<AttributionRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            corrections: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn import_corrections(&self, corrections: Vec<Correction>) -> usize {
        let mut guard = self.corrections.lock().expect("store mutex poisoned");
        let imported = corrections.len();
        guard.extend(corrections);
        imported
    }
}

impl ClassificationStore for InMemoryClassificationStore {
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

/// Audit sink that keeps events in memory and mirrors them onto the log
/// stream, enough for demos and single-node installs.
#[derive(Default)]
pub(crate) struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    #[cfg(test)]
    pub(crate) fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn publish(&self, event: AuditEvent) -> Result<(), AuditError> {
        info!(
            document_id = ?event.document_id,
            field = event.field.label(),
            source = event.change_source.label(),
            "classification change audited"
        );
        self.events
            .lock()
            .expect("audit mutex poisoned")
            .push(event);
        Ok(())
    }
}

pub(crate) fn default_engine_config() -> EngineConfig {
    EngineConfig::default()
}

/// Starter rule set for development installs, mirroring the rules admins
/// typically author first: route recognisable invoices and tag large amounts.
pub(crate) fn demo_rules() -> Vec<AttributionRule> {
    vec![
        AttributionRule {
            id: 1,
            name: "Factures consulting".to_string(),
            description: Some("Route consulting invoices to the IT vendor".to_string()),
            priority: 200,
            active: true,
            stop_on_match: false,
            conditions: vec![
                RuleCondition {
                    group: 0,
                    condition: Condition {
                        field: FieldKind::Content,
                        field_name: None,
                        operator: ConditionOperator::Contains,
                        value: "consulting".to_string(),
                    },
                },
                RuleCondition {
                    group: 0,
                    condition: Condition {
                        field: FieldKind::Amount,
                        field_name: None,
                        operator: ConditionOperator::Between,
                        value: "[100, 5000]".to_string(),
                    },
                },
            ],
            actions: vec![
                RuleAction::SetCorrespondent(12),
                RuleAction::SetDocumentType(3),
            ],
        },
        AttributionRule {
            id: 2,
            name: "Gros montants".to_string(),
            description: Some("Flag anything above 10k for review".to_string()),
            priority: 100,
            active: true,
            stop_on_match: false,
            conditions: vec![RuleCondition {
                group: 0,
                condition: Condition {
                    field: FieldKind::Amount,
                    field_name: None,
                    operator: ConditionOperator::GreaterThan,
                    value: "10000".to_string(),
                },
            }],
            actions: vec![RuleAction::AddTag(42)],
        },
    ]
}
