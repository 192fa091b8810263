//! Model Module - Classifier, Scaler, Risk Tiers
//!
//! Tách logic inference khỏi feature assembly.
//! Dễ dàng swap model: ONNX hoặc JSON linear model.

pub mod artifacts;
pub mod inference;
pub mod scaler;
pub mod threshold;

#[cfg(test)]
pub(crate) mod testing;

// Re-export common types
pub use artifacts::{load_artifacts, ArtifactError, ArtifactPaths, ArtifactStatus, LoadReport, LoadResult};
pub use inference::{
    ClassifierAdapter, ClassifierOutput, ClassifierStats, InferenceError, LabelRules, LogisticModel,
    OnnxClassifier, RiskClassifier, Scored,
};
pub use scaler::{Scaler, ScalerError};
pub use threshold::{RiskTier, ThresholdConfig, ThresholdError};
