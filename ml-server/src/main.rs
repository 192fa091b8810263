//! NeuroShield ML Service
//!
//! HTTP front for the stroke risk scoring pipeline.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    NEUROSHIELD ML SERVICE                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌───────────────┐  ┌─────────────────────┐ │
//! │  │  API      │  │  Worker pool  │  │  Prediction sink    │ │
//! │  │  (Axum)   │─▶│  (blocking)   │─▶│  (JSONL, optional)  │ │
//! │  └───────────┘  └───────┬───────┘  └─────────────────────┘ │
//! │                         ▼                                   │
//! │                ┌──────────────────┐                        │
//! │                │ PipelineContext  │                        │
//! │                └──────────────────┘                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod worker;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use neuroshield_core::{ArtifactPaths, JsonlSink, PipelineConfig, PipelineContext, PredictionSink};

pub use error::{AppError, AppResult};
use worker::Worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    // Initialize logging (core `log` records are bridged by tracing-log).
    // JSON lines in production, human-readable otherwise.
    let production = config.is_production();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "neuroshield_ml=debug,neuroshield_core=info,tower_http=debug".into()))
        .with(production.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!production).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!("NeuroShield ML Service starting ({})...", config.environment);

    // Artifacts are loaded once; a missing classifier still lets the service start
    let context = PipelineContext::load(&ArtifactPaths::from_env(), PipelineConfig::from_env());
    if !context.is_scoring_enabled() {
        tracing::warn!("No classifier loaded: /predict will answer 503");
    }
    if !context.is_explainer_enabled() {
        tracing::warn!("Explanations unavailable");
    }

    let sink: Option<Arc<dyn PredictionSink>> = match &config.prediction_log_dir {
        Some(dir) => match JsonlSink::new(dir.clone()) {
            Ok(sink) => Some(Arc::new(sink)),
            Err(e) => {
                tracing::warn!("Prediction log disabled: {}", e);
                None
            }
        },
        None => None,
    };

    // Build application state
    let state = AppState::new(context, sink, &config);

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub worker: Worker,
    pub sink: Option<Arc<dyn PredictionSink>>,
    pub config: config::Config,
}

impl AppState {
    fn new(context: PipelineContext, sink: Option<Arc<dyn PredictionSink>>, config: &config::Config) -> Self {
        Self {
            worker: Worker::new(
                Arc::new(context),
                config.worker_pool_size,
                Duration::from_millis(config.explain_timeout_ms),
            ),
            sink,
            config: config.clone(),
        }
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/test-predict", post(handlers::predict::test_predict))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
