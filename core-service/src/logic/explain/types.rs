use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logic::model::InferenceError;

/// Which way a feature pushes the positive-class probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increases,
    Decreases,
}

impl Direction {
    pub fn from_sign(contribution: f64) -> Self {
        if contribution >= 0.0 {
            Direction::Increases
        } else {
            Direction::Decreases
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationItem {
    pub feature_name: String,
    /// e.g. `age > 54.30`, `smokes=1`
    pub human_rule: String,
    pub signed_contribution: f64,
    pub direction: Direction,
}

/// Surrogate fit quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocalFit {
    pub intercept: f64,
    /// Weighted R² on the neighborhood
    pub score: f64,
    /// Surrogate output at the instance
    pub local_prediction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Ranked by |signed_contribution|, largest first
    pub items: Vec<ExplanationItem>,
    pub local_fit: LocalFit,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainError {
    #[error("explanation engine is disabled")]
    Disabled,
    #[error("degenerate reference sample: {0}")]
    DegenerateSample(String),
    #[error("classifier failed during explanation: {0}")]
    Classifier(#[from] InferenceError),
    #[error("surrogate regression is singular")]
    Singular,
    #[error("explanation exceeded its {budget_ms} ms budget")]
    TimedOut { budget_ms: u64 },
    #[error("invalid classifier output during explanation: {0}")]
    InvalidOutput(String),
}
