use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{
    AttributeField, AttributeValue, CorrectionSource, DocumentId, DocumentRecord,
};
use super::repository::{AuditSink, ClassificationStore};
use super::rules::AttributionRule;
use super::service::{ClassificationService, ServiceError};

/// Router builder exposing the classification endpoints.
pub fn classification_router<S, A>(service: Arc<ClassificationService<S, A>>) -> Router
where
    S: ClassificationStore + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route(
            "/api/v1/classification/suggestions",
            post(suggestions_handler::<S, A>),
        )
        .route(
            "/api/v1/classification/corrections",
            post(corrections_handler::<S, A>),
        )
        .route(
            "/api/v1/classification/rules/test",
            post(rule_test_handler::<S, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct SuggestionRequest {
    pub document: DocumentRecord,
    #[serde(default)]
    pub auto_apply: bool,
}

#[derive(Debug, Deserialize)]
pub struct CorrectionRequest {
    pub document: DocumentRecord,
    pub field: AttributeField,
    pub new_value: AttributeValue,
    #[serde(default = "default_source")]
    pub source: CorrectionSource,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

const fn default_source() -> CorrectionSource {
    CorrectionSource::Manual
}

const fn default_confidence() -> f64 {
    1.0
}

/// Trimmed correction echo; the stored record also carries the feature
/// fingerprint, which API clients have no use for.
#[derive(Debug, Serialize)]
pub struct CorrectionView {
    pub document_id: Option<DocumentId>,
    pub field: AttributeField,
    pub old_value: Option<AttributeValue>,
    pub new_value: AttributeValue,
    pub source: CorrectionSource,
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
pub struct RuleTestRequest {
    pub rule: AttributionRule,
    pub documents: Vec<DocumentRecord>,
}

pub(crate) async fn suggestions_handler<S, A>(
    State(service): State<Arc<ClassificationService<S, A>>>,
    axum::Json(request): axum::Json<SuggestionRequest>,
) -> Response
where
    S: ClassificationStore + 'static,
    A: AuditSink + 'static,
{
    match service.suggest_for(&request.document, request.auto_apply) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn corrections_handler<S, A>(
    State(service): State<Arc<ClassificationService<S, A>>>,
    axum::Json(request): axum::Json<CorrectionRequest>,
) -> Response
where
    S: ClassificationStore + 'static,
    A: AuditSink + 'static,
{
    match service.record_correction(
        &request.document,
        request.field,
        request.new_value,
        request.source,
        request.confidence,
    ) {
        Ok(correction) => {
            let view = CorrectionView {
                document_id: correction.document_id,
                field: correction.field,
                old_value: correction.old_value,
                new_value: correction.new_value,
                source: correction.source,
                confidence: correction.confidence,
            };
            (StatusCode::ACCEPTED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rule_test_handler<S, A>(
    State(service): State<Arc<ClassificationService<S, A>>>,
    axum::Json(request): axum::Json<RuleTestRequest>,
) -> Response
where
    S: ClassificationStore + 'static,
    A: AuditSink + 'static,
{
    let results = service.test_rule(&request.rule, &request.documents);
    (StatusCode::OK, axum::Json(results)).into_response()
}

fn error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::InvalidConfidence { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::Engine(_) | ServiceError::Store(_) | ServiceError::Audit(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
