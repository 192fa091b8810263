//! NeuroShield Core - Explainable Risk Scoring Pipeline
//!
//! raw input → canonicalize → assemble → classify → explain → aggregate.
//!
//! Toàn bộ artifacts (model, scaler, schema, reference sample) được load một lần
//! vào `PipelineContext`, sau đó chỉ đọc.

pub mod constants;
pub mod logic;

pub use logic::config::{ExplainConfig, PipelineConfig};
pub use logic::dataset::{JsonlSink, MemorySink, PredictionRecord, PredictionSink, SinkError, SinkStats};
pub use logic::features::{canonicalize, CanonicalFields, FeatureSchema, FeatureVector, RawInput};
pub use logic::model::{load_artifacts, ArtifactPaths, LoadResult, RiskTier, ThresholdConfig};
pub use logic::pipeline::{PipelineContext, PredictionResult, ScoreError};
pub use logic::status::StatusReport;
