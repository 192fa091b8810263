//! Risk Classifier Adapter - ONNX Runtime Integration
//!
//! Bọc classifier black-box (ONNX hoặc JSON) sau một trait chung.
//! Adapter lấy xác suất class dương, suy ra class và risk tier.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use ndarray::{Array2, ArrayView2};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::threshold::{RiskTier, ThresholdConfig};
use crate::logic::features::{FeatureSchema, FeatureVector, LayoutMismatchError};

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("no classifier loaded")]
    NotLoaded,
    #[error("classifier expects {expected} features, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),
    #[error("classifier runtime error: {0}")]
    Runtime(String),
    #[error("classifier returned invalid output: {0}")]
    InvalidOutput(String),
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Raw batch output of a classifier
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierOutput {
    /// P(class = 1) per row, optionally with the model's own labels
    Probabilities {
        positive: Vec<f64>,
        labels: Option<Vec<u8>>,
    },
    /// Hard labels only
    Labels(Vec<u8>),
}

impl ClassifierOutput {
    fn rows(&self) -> usize {
        match self {
            ClassifierOutput::Probabilities { positive, .. } => positive.len(),
            ClassifierOutput::Labels(labels) => labels.len(),
        }
    }
}

/// Trait cho classifier engines (ONNX, JSON linear models, ...)
pub trait RiskClassifier: Send + Sync {
    /// Short identifier for status/logging
    fn name(&self) -> &str;

    /// Expected input width, if the model declares one
    fn n_features(&self) -> Option<usize>;

    /// Score a `[rows, features]` batch
    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError>;
}

fn check_width(expected: usize, batch: &ArrayView2<'_, f64>) -> Result<(), InferenceError> {
    if batch.ncols() != expected {
        return Err(InferenceError::WidthMismatch {
            expected,
            actual: batch.ncols(),
        });
    }
    Ok(())
}

fn linear_scores(coefficients: &[f64], intercept: f64, batch: ArrayView2<'_, f64>) -> Vec<f64> {
    batch
        .rows()
        .into_iter()
        .map(|row| row.iter().zip(coefficients).map(|(x, w)| x * w).sum::<f64>() + intercept)
        .collect()
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// ============================================================================
// JSON CLASSIFIERS
// ============================================================================

/// Logistic regression exported as plain coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl RiskClassifier for LogisticModel {
    fn name(&self) -> &str {
        "logistic_regression"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        check_width(self.coefficients.len(), &batch)?;
        let positive = linear_scores(&self.coefficients, self.intercept, batch)
            .into_iter()
            .map(sigmoid)
            .collect();
        Ok(ClassifierOutput::Probabilities { positive, labels: None })
    }
}

/// Linear decision rule that only emits labels (no probabilities)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRules {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    /// Label 1 when the score is strictly above this
    #[serde(default)]
    pub cutoff: f64,
}

impl RiskClassifier for LabelRules {
    fn name(&self) -> &str {
        "label_rules"
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        check_width(self.coefficients.len(), &batch)?;
        let labels = linear_scores(&self.coefficients, self.intercept, batch)
            .into_iter()
            .map(|s| u8::from(s > self.cutoff))
            .collect();
        Ok(ClassifierOutput::Labels(labels))
    }
}

// ============================================================================
// ONNX IMPLEMENTATION
// ============================================================================

/// ONNX graph: one f32 `[N, F]` input, a probability output and an optional label output.
///
/// Session.run cần `&mut`, nên session nằm sau Mutex riêng của variant này.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    probability_output: String,
    label_output: Option<String>,
}

impl OnnxClassifier {
    pub fn from_file(path: &Path) -> Result<Self, InferenceError> {
        log::info!("Loading ONNX model from: {}", path.display());

        let session = Session::builder()
            .map_err(|e| InferenceError::Runtime(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Runtime(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| InferenceError::Runtime(format!("Failed to load model: {}", e)))?;

        let names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();

        // sklearn-onnx: "output_label" + "output_probability" (zipmap disabled)
        let probability_output = names
            .iter()
            .find(|n| n.to_lowercase().contains("prob"))
            .or_else(|| names.last())
            .cloned()
            .ok_or_else(|| InferenceError::InvalidOutput("model defines no outputs".to_string()))?;

        let label_output = names
            .iter()
            .find(|n| n.to_lowercase().contains("label") && **n != probability_output)
            .cloned();

        log::info!(
            "ONNX model loaded (probability output: {}, label output: {:?})",
            probability_output,
            label_output
        );

        Ok(Self {
            session: Mutex::new(session),
            probability_output,
            label_output,
        })
    }
}

impl RiskClassifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn n_features(&self) -> Option<usize> {
        // Width is enforced by the runtime itself
        None
    }

    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        let rows = batch.nrows();
        let input: Array2<f32> = batch.mapv(|v| v as f32);

        let input_tensor =
            Value::from_array(input).map_err(|e| InferenceError::Runtime(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Runtime(format!("Inference failed: {}", e)))?;

        let probabilities = outputs
            .get(&self.probability_output)
            .ok_or_else(|| InferenceError::InvalidOutput(format!("missing output {}", self.probability_output)))?
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::InvalidOutput(format!("Extract error: {}", e)))?
            .1;

        // [N, 2] → column 1; [N] or [N, 1] → as is
        let positive: Vec<f64> = if probabilities.len() == rows * 2 {
            probabilities.chunks(2).map(|pair| f64::from(pair[1])).collect()
        } else if probabilities.len() == rows {
            probabilities.iter().map(|&p| f64::from(p)).collect()
        } else {
            return Err(InferenceError::InvalidOutput(format!(
                "probability tensor has {} values for {} rows",
                probabilities.len(),
                rows
            )));
        };

        let labels = match &self.label_output {
            Some(name) => outputs
                .get(name)
                .and_then(|value| value.try_extract_tensor::<i64>().ok())
                .map(|(_, data)| data.iter().map(|&l| u8::from(l > 0)).collect::<Vec<u8>>())
                .filter(|labels| labels.len() == rows),
            None => None,
        };

        Ok(ClassifierOutput::Probabilities { positive, labels })
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

/// Score of one instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scored {
    pub probability: f64,
    pub predicted_class: u8,
    pub risk_tier: RiskTier,
    /// Probability is the hard label (model exposes no probabilities)
    pub probability_from_label: bool,
}

/// Adapter latency stats
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierStats {
    pub classifier: String,
    pub inference_count: u64,
    pub avg_latency_ms: f32,
}

pub struct ClassifierAdapter {
    classifier: Box<dyn RiskClassifier>,
    thresholds: ThresholdConfig,
    latency_sum_us: AtomicU64,
    inference_count: AtomicU64,
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("classifier", &self.classifier.name())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl ClassifierAdapter {
    pub fn new(classifier: Box<dyn RiskClassifier>, thresholds: ThresholdConfig) -> Self {
        Self {
            classifier,
            thresholds,
            latency_sum_us: AtomicU64::new(0),
            inference_count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        self.classifier.name()
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Score one vector. The vector must carry this schema's layout tag.
    pub fn score(&self, vector: &FeatureVector, schema: &FeatureSchema) -> Result<Scored, InferenceError> {
        vector.validate(schema)?;

        let batch = Array2::from_shape_vec((1, vector.len()), vector.as_slice().to_vec())
            .map_err(|e| InferenceError::Runtime(format!("Array error: {}", e)))?;

        let output = self.run(batch.view())?;

        let scored = match output {
            ClassifierOutput::Probabilities { positive, labels } => {
                let probability = checked_probability(positive[0])?;
                let predicted_class = labels
                    .and_then(|l| l.first().copied())
                    .unwrap_or_else(|| u8::from(probability > 0.5));
                Scored {
                    probability,
                    predicted_class,
                    risk_tier: self.thresholds.tier(probability),
                    probability_from_label: false,
                }
            }
            ClassifierOutput::Labels(labels) => {
                let label = labels[0].min(1);
                log::warn!(
                    "Classifier '{}' exposes labels only; probability degraded to label {}",
                    self.name(),
                    label
                );
                let probability = f64::from(label);
                Scored {
                    probability,
                    predicted_class: label,
                    risk_tier: self.thresholds.tier(probability),
                    probability_from_label: true,
                }
            }
        };

        Ok(scored)
    }

    /// Positive-class probability for every row. Label-only models yield 0/1.
    pub fn predict_proba_batch(&self, batch: ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError> {
        match self.run(batch)? {
            ClassifierOutput::Probabilities { positive, .. } => {
                positive.into_iter().map(checked_probability).collect()
            }
            ClassifierOutput::Labels(labels) => Ok(labels.into_iter().map(|l| f64::from(l.min(1))).collect()),
        }
    }

    pub fn stats(&self) -> ClassifierStats {
        let sum = self.latency_sum_us.load(Ordering::Relaxed);
        let count = self.inference_count.load(Ordering::Relaxed);
        let avg = if count > 0 { (sum as f32 / count as f32) / 1000.0 } else { 0.0 };

        ClassifierStats {
            classifier: self.name().to_string(),
            inference_count: count,
            avg_latency_ms: avg,
        }
    }

    fn run(&self, batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        if let Some(expected) = self.classifier.n_features() {
            check_width(expected, &batch)?;
        }

        let start_time = std::time::Instant::now();
        let output = self.classifier.infer(batch)?;

        self.latency_sum_us
            .fetch_add(start_time.elapsed().as_micros() as u64, Ordering::Relaxed);
        self.inference_count.fetch_add(1, Ordering::Relaxed);

        if output.rows() != batch.nrows() {
            return Err(InferenceError::InvalidOutput(format!(
                "{} results for {} rows",
                output.rows(),
                batch.nrows()
            )));
        }
        Ok(output)
    }
}

/// NaN is a failure; anything else is clamped into [0, 1]
fn checked_probability(p: f64) -> Result<f64, InferenceError> {
    if p.is_nan() {
        return Err(InferenceError::InvalidOutput("probability is NaN".to_string()));
    }
    Ok(p.clamp(0.0, 1.0))
}
