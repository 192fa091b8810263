//! Result Aggregator
//!
//! Ghép classifier output + explanation thành một PredictionResult. Pure, không lỗi.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::logic::explain::{Explanation, ExplanationItem, LocalFit};
use crate::logic::features::ScalingOutcome;
use crate::logic::model::{RiskTier, Scored};

/// Non-fatal observations made while scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Input fields that fell back to a default
    pub defaulted_fields: Vec<String>,
    /// Schema columns with no producer (zero-filled)
    pub missing_columns: Vec<String>,
    pub scaling: ScalingOutcome,
    /// Probability is the classifier's hard label
    pub probability_from_label: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            defaulted_fields: Vec::new(),
            missing_columns: Vec::new(),
            scaling: ScalingOutcome::NotConfigured,
            probability_from_label: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// P(class = 1), in [0, 1]
    pub probability: f64,
    pub predicted_class: u8,
    pub risk_tier: RiskTier,
    /// Ranked contributions; empty when not explainable
    pub explanation: Vec<ExplanationItem>,
    pub explainable: bool,
    pub local_fit: Option<LocalFit>,
    pub diagnostics: Diagnostics,
}

/// Compose one result. `explanation` is `None` when explanation failed or is disabled.
pub fn aggregate(scored: Scored, explanation: Option<Explanation>, mut diagnostics: Diagnostics) -> PredictionResult {
    diagnostics.probability_from_label = scored.probability_from_label;

    let (items, local_fit) = match explanation {
        Some(explanation) => (explanation.items, Some(explanation.local_fit)),
        None => (Vec::new(), None),
    };

    PredictionResult {
        probability: scored.probability,
        predicted_class: scored.predicted_class,
        risk_tier: scored.risk_tier,
        explainable: local_fit.is_some(),
        explanation: items,
        local_fit,
        diagnostics,
    }
}

impl PredictionResult {
    /// feature name → signed contribution; `None` when not explainable
    pub fn key_factors(&self) -> Option<BTreeMap<String, f64>> {
        if !self.explainable {
            return None;
        }
        Some(
            self.explanation
                .iter()
                .map(|item| (item.feature_name.clone(), item.signed_contribution))
                .collect(),
        )
    }

    /// Probability rounded to 4 decimals for display
    pub fn rounded_probability(&self) -> f64 {
        (self.probability * 10_000.0).round() / 10_000.0
    }
}
