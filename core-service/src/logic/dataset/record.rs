use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logic::pipeline::PredictionResult;

/// One persisted prediction, keyed by patient
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub patient_id: String,
    pub doctor_id: Option<String>,

    // Classifier output
    pub probability: f64,
    pub predicted_class: u8,
    pub risk_level: String,

    // Explanation (None when not explainable)
    pub key_factors: Option<BTreeMap<String, f64>>,
}

impl PredictionRecord {
    pub fn new(patient_id: &str, doctor_id: Option<&str>, result: &PredictionResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.map(str::to_string),
            probability: result.rounded_probability(),
            predicted_class: result.predicted_class,
            risk_level: result.risk_tier.label().to_string(),
            key_factors: result.key_factors(),
        }
    }
}
