//! Logic Module - Scoring Pipeline & Engines
//!
//! Chứa các engine của pipeline chấm điểm nguy cơ:
//!
//! - `features/` - Canonicalization + assembly theo FeatureSchema
//! - `model/` - Artifacts, scaler, classifier adapter, risk tiers
//! - `explain/` - Local surrogate explanations
//! - `pipeline/` - PipelineContext + result aggregation
//! - `dataset/` - Prediction records (JSONL / memory)

pub mod config;
pub mod status;

// Pipeline stages
pub mod features;
pub mod model;
pub mod explain;
pub mod pipeline;
pub mod dataset;
