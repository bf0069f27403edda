use crate::cli::ServeArgs;
use crate::infra::{
    default_engine_config, demo_rules, AppState, InMemoryAuditSink, InMemoryClassificationStore,
};
use crate::routes::with_classification_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use docsort::classify::ClassificationService;
use docsort::config::{AppConfig, AppEnvironment};
use docsort::error::AppError;
use docsort::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    // Development installs get the starter rules so the suggestion endpoint
    // has observable behavior before any admin authors a rule.
    let store = if config.environment == AppEnvironment::Development {
        Arc::new(InMemoryClassificationStore::with_rules(demo_rules()))
    } else {
        Arc::new(InMemoryClassificationStore::default())
    };
    let audit = Arc::new(InMemoryAuditSink::default());
    let service = Arc::new(ClassificationService::new(
        store.clone(),
        audit,
        default_engine_config(),
    )?);

    let app = with_classification_routes(service)
        .layer(Extension(app_state))
        .layer(Extension(store))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "document attribution service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
