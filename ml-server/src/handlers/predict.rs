//! Prediction handlers

use std::collections::BTreeMap;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::Serialize;
use serde_json::{json, Map, Value};

use neuroshield_core::logic::explain::{Direction, ExplanationItem};
use neuroshield_core::logic::pipeline::Diagnostics;
use neuroshield_core::{PredictionResult, RawInput};

use crate::{AppError, AppResult, AppState};

#[derive(Debug, Serialize)]
pub struct TopFeature {
    pub name: String,
    pub rule: String,
    pub impact: f64,
    pub direction: Direction,
}

impl From<&ExplanationItem> for TopFeature {
    fn from(item: &ExplanationItem) -> Self {
        Self {
            name: item.feature_name.clone(),
            rule: item.human_rule.clone(),
            impact: item.signed_contribution,
            direction: item.direction,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: u8,
    pub probability: f64,
    pub risk_level: &'static str,
    pub risk_color: &'static str,
    pub prediction_label: String,
    pub key_factors: Option<BTreeMap<String, f64>>,
    pub top_features: Vec<TopFeature>,
    pub explanation_available: bool,
    pub diagnostics: Diagnostics,
}

impl PredictResponse {
    fn new(result: &PredictionResult, prediction_label: &str) -> Self {
        Self {
            prediction: result.predicted_class,
            probability: result.rounded_probability(),
            risk_level: result.risk_tier.label(),
            risk_color: result.risk_tier.color(),
            prediction_label: prediction_label.to_string(),
            key_factors: result.key_factors(),
            top_features: result.explanation.iter().map(TopFeature::from).collect(),
            explanation_available: result.explainable,
            diagnostics: result.diagnostics.clone(),
        }
    }
}

/// Identifiers may arrive as strings or numbers
fn take_id(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Score one patient
pub async fn predict(
    State(state): State<AppState>,
    body: Result<Json<Map<String, Value>>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(mut fields) = body?;
    let patient_id = take_id(&mut fields, "patient_id");
    let doctor_id = take_id(&mut fields, "doctor_id");

    let result = state.worker.score(RawInput::new(fields)).await?;
    let label = state.worker.context().schema().class_name(result.predicted_class).to_string();

    tracing::info!(
        "Prediction: {} ({:.4}, {}) explainable={}",
        label,
        result.probability,
        result.risk_tier,
        result.explainable
    );

    if let (Some(patient_id), Some(sink)) = (patient_id, state.sink.clone()) {
        let recorded = result.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            sink.record(&patient_id, doctor_id.as_deref(), &recorded)
        })
        .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Failed to record prediction: {}", e),
            Err(e) => tracing::error!("Prediction record task failed: {}", e),
        }
    }

    Ok(Json(PredictResponse::new(&result, &label)))
}

/// Fixed sample patient, for smoke tests
pub fn sample_patient() -> Map<String, Value> {
    let sample = json!({
        "age": 67,
        "hypertension": 1,
        "heart_disease": 0,
        "avg_glucose_level": 228.69,
        "bmi": 36.6,
        "ever_married": 1,
        "gender": "Male",
        "work_type": "Private",
        "residence_type": "Urban",
        "smoking_status": "formerly smoked"
    });
    match sample {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

pub async fn test_predict(State(state): State<AppState>) -> AppResult<Json<PredictResponse>> {
    let result = state.worker.score(RawInput::new(sample_patient())).await?;
    let label = state.worker.context().schema().class_name(result.predicted_class);
    Ok(Json(PredictResponse::new(&result, label)))
}
