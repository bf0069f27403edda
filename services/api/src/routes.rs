use std::io::Cursor;
use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use serde_json::json;

use docsort::classify::{
    classification_router, AuditSink, ClassificationService, ClassificationStore,
    CorrectionBackfillImporter, FeatureExtractor,
};
use docsort::error::AppError;

use crate::infra::{AppState, InMemoryClassificationStore};

pub(crate) fn with_classification_routes<S, A>(
    service: Arc<ClassificationService<S, A>>,
) -> axum::Router
where
    S: ClassificationStore + 'static,
    A: AuditSink + 'static,
{
    classification_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/classification/backfill",
            axum::routing::post(backfill_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct BackfillRequest {
    pub(crate) corrections_csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BackfillResponse {
    pub(crate) imported: usize,
}

/// Seed the similarity corpus from a legacy classification export posted as a
/// CSV payload, mirroring the CLI backfill path.
pub(crate) async fn backfill_endpoint(
    Extension(store): Extension<Arc<InMemoryClassificationStore>>,
    Json(payload): Json<BackfillRequest>,
) -> Result<Json<BackfillResponse>, AppError> {
    let reader = Cursor::new(payload.corrections_csv.into_bytes());
    let corrections = CorrectionBackfillImporter::from_reader(reader, &FeatureExtractor::default())?;
    let imported = store.import_corrections(corrections);

    Ok(Json(BackfillResponse { imported }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn backfill_endpoint_imports_rows() {
        let store = Arc::new(InMemoryClassificationStore::default());
        let request = BackfillRequest {
            corrections_csv: "Document ID,Field,Value,Previous Value,Source,Confidence,Corrected At,\
Correspondent ID,Document Type ID,Amount,Mime Type,Filename,Tags,Content\n\
41,correspondent,12,,manual,1.0,2025-06-12T09:30:00Z,12,3,450.00,application/pdf,facture.pdf,3,Facture consulting\n"
                .to_string(),
        };

        let Json(body) = backfill_endpoint(Extension(store.clone()), Json(request))
            .await
            .expect("backfill imports");

        assert_eq!(body.imported, 1);
        let stored = store
            .recent_corrections(docsort::classify::AttributeField::Correspondent, 10)
            .expect("store readable");
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test]
    async fn backfill_endpoint_rejects_invalid_csv() {
        let store = Arc::new(InMemoryClassificationStore::default());
        let request = BackfillRequest {
            corrections_csv: "Document ID,Field\n1,correspondent,unexpected-extra-column".to_string(),
        };

        let error = backfill_endpoint(Extension(store), Json(request))
            .await
            .expect_err("invalid csv fails");

        assert!(matches!(error, AppError::Import(_)));
    }
}
