//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use neuroshield_core::constants::{APP_NAME, APP_VERSION};
use neuroshield_core::{SinkStats, StatusReport};

use crate::AppState;

#[derive(Serialize)]
pub struct ServiceInfo {
    service: String,
    status: &'static str,
    environment: String,
    model_loaded: bool,
    explainer_available: bool,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    core_version: &'static str,
    timestamp: i64,
    /// None when predictions are not persisted
    prediction_log: Option<SinkStats>,
    #[serde(flatten)]
    report: StatusReport,
}

pub async fn root(State(state): State<AppState>) -> Json<ServiceInfo> {
    let context = state.worker.context();
    Json(ServiceInfo {
        service: format!("{} ML Service", APP_NAME),
        status: if context.is_scoring_enabled() { "running" } else { "degraded" },
        environment: state.config.environment.clone(),
        model_loaded: context.is_scoring_enabled(),
        explainer_available: context.is_explainer_enabled(),
    })
}

/// Liveness: always 200, even without a classifier
pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.worker.context().status();
    Json(HealthResponse {
        status: report.status(),
        version: env!("CARGO_PKG_VERSION"),
        core_version: APP_VERSION,
        timestamp: chrono::Utc::now().timestamp(),
        prediction_log: state.sink.as_ref().map(|sink| sink.stats()),
        report,
    })
}
