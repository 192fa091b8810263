//! End-to-end pipeline tests over in-memory classifiers

use std::sync::Arc;
use std::time::Duration;

use ndarray::Array2;
use serde_json::{json, Value};

use super::*;
use crate::logic::config::{ExplainConfig, PipelineConfig};
use crate::logic::explain::{ExplainError, ReferenceSample};
use crate::logic::features::{FeatureSchema, RawInput};
use crate::logic::model::testing::{FailingClassifier, RecordingClassifier};
use crate::logic::model::{InferenceError, LogisticModel, RiskClassifier, RiskTier, ThresholdConfig};

fn raw(value: Value) -> RawInput {
    match value {
        Value::Object(map) => RawInput::new(map),
        _ => RawInput::default(),
    }
}

fn sample_patient() -> RawInput {
    raw(json!({
        "age": 67,
        "hypertension": 1,
        "heart_disease": 0,
        "avg_glucose_level": 228.69,
        "bmi": 36.6,
        "gender": "Male",
        "work_type": "Private",
        "residence_type": "Urban",
        "smoking_status": "formerly smoked"
    }))
}

fn logistic(weights: &[(&str, f64)], intercept: f64) -> LogisticModel {
    let schema = FeatureSchema::default_schema();
    let mut coefficients = vec![0.0; schema.len()];
    for (name, w) in weights {
        coefficients[schema.index_of(name).unwrap()] = *w;
    }
    LogisticModel { coefficients, intercept }
}

fn reference() -> ReferenceSample {
    let schema = FeatureSchema::default_schema();
    let data = Array2::from_shape_fn((40, schema.len()), |(i, j)| {
        let hot = |col: usize| if col == j { 1.0 } else { 0.0 };
        match j {
            0 => 20.0 + ((i * 31) % 60) as f64,
            1 | 2 => (i % 5 == j) as u8 as f64,
            3 => 80.0 + ((i * 47) % 140) as f64,
            4 => 20.0 + ((i * 13) % 20) as f64,
            5 => (i % 2) as f64,
            6 | 7 => hot(6 + i % 2),
            8..=12 => hot(8 + i % 5),
            13 | 14 => hot(13 + i % 2),
            _ => hot(15 + i % 4),
        }
    });
    ReferenceSample::new(data, &schema).unwrap()
}

/// Shares the recorder between the context and the assertions
struct Shared(Arc<RecordingClassifier>);

impl RiskClassifier for Shared {
    fn name(&self) -> &str {
        self.0.name()
    }

    fn n_features(&self) -> Option<usize> {
        self.0.n_features()
    }

    fn infer(
        &self,
        batch: ndarray::ArrayView2<'_, f64>,
    ) -> Result<crate::logic::model::ClassifierOutput, InferenceError> {
        self.0.infer(batch)
    }
}

fn context_with(classifier: Box<dyn RiskClassifier>, reference: Option<ReferenceSample>) -> PipelineContext {
    let config = PipelineConfig {
        thresholds: ThresholdConfig::new(0.3, 0.6).unwrap(),
        explain: ExplainConfig { num_samples: 200, ..Default::default() },
    };
    PipelineContext::new(FeatureSchema::default_schema(), None, Some(classifier), reference, config)
}

#[test]
fn test_sample_patient_scored_once() {
    let recorder = Arc::new(RecordingClassifier::new(logistic(&[("age", 0.05), ("hypertension", 0.7)], -4.0)));
    let context = context_with(Box::new(Shared(recorder.clone())), None);

    let result = context.score(&sample_patient()).unwrap();

    let calls = recorder.calls();
    assert_eq!(calls.len(), 1, "classifier invoked exactly once");
    assert_eq!(calls[0].len(), 1);
    let vector = &calls[0][0];
    let schema = context.schema();
    assert_eq!(vector.len(), schema.len());
    assert_eq!(vector[schema.index_of("private_work").unwrap()], 1.0);
    assert_eq!(vector[schema.index_of("formerly_smoked").unwrap()], 1.0);
    for other in ["self_employed", "government_work", "children_work", "never_worked", "never_smoked", "smokes"] {
        assert_eq!(vector[schema.index_of(other).unwrap()], 0.0, "{}", other);
    }

    assert!((0.0..=1.0).contains(&result.probability));
    assert_eq!(result.risk_tier, context.config().thresholds.tier(result.probability));
    assert_eq!(result.predicted_class, u8::from(result.probability > 0.5));
}

#[test]
fn test_tier_follows_configured_breakpoints() {
    // sigmoid(0) = 0.5 → Moderate with cuts at 0.3 / 0.6
    let context = context_with(Box::new(logistic(&[], 0.0)), None);
    let result = context.score(&sample_patient()).unwrap();
    assert_eq!(result.probability, 0.5);
    assert_eq!(result.risk_tier, RiskTier::Moderate);
}

#[test]
fn test_unknown_smoking_string() {
    let recorder = Arc::new(RecordingClassifier::new(logistic(&[], -1.0)));
    let context = context_with(Box::new(Shared(recorder.clone())), None);

    let input = raw(json!({"age": 40, "smoking_status": "vapes sometimes"}));
    let prepared = context.prepare(&input);
    let schema = context.schema();
    assert_eq!(prepared.vector().get_by_name(schema, "smoking_unknown"), Some(1.0));
    assert_eq!(prepared.vector().get_by_name(schema, "smokes"), Some(0.0));

    let result = context.score(&input).unwrap();
    assert!(result.diagnostics.defaulted_fields.contains(&"smoking_status".to_string()));
    assert_eq!(recorder.calls()[0][0][schema.index_of("smoking_unknown").unwrap()], 1.0);
}

#[test]
fn test_no_reference_degrades_explanation_only() {
    let model = logistic(&[("age", 0.05)], -4.0);
    let expected = {
        let x = 0.05 * 67.0 - 4.0;
        1.0 / (1.0 + f64::exp(-x))
    };
    let context = context_with(Box::new(model), None);
    assert!(context.is_scoring_enabled());
    assert!(!context.is_explainer_enabled());

    for _ in 0..3 {
        let result = context.score(&sample_patient()).unwrap();
        assert!(!result.explainable);
        assert!(result.explanation.is_empty());
        assert!(result.key_factors().is_none());
        assert!((result.probability - expected).abs() < 1e-9);
    }
}

#[test]
fn test_explained_when_reference_loaded() {
    let context = context_with(Box::new(logistic(&[("age", 0.08)], -5.0)), Some(reference()));
    assert!(context.is_explainer_enabled());

    let result = context.score(&sample_patient()).unwrap();
    assert!(result.explainable);
    assert!(!result.explanation.is_empty());
    assert!(result.explanation.len() <= 5);
    assert_eq!(result.explanation[0].feature_name, "age");
    assert!(result.local_fit.is_some());
}

#[test]
fn test_explanation_failure_is_absorbed() {
    let config = PipelineConfig {
        thresholds: ThresholdConfig::default(),
        explain: ExplainConfig { num_samples: 1, ..Default::default() },
    };
    let context = PipelineContext::new(
        FeatureSchema::default_schema(),
        None,
        Some(Box::new(logistic(&[("age", 0.08)], -5.0))),
        Some(reference()),
        config,
    );

    let result = context.score(&sample_patient()).unwrap();
    assert!(!result.explainable);
    assert!(result.explanation.is_empty());
}

#[test]
fn test_missing_classifier() {
    let context = PipelineContext::new(
        FeatureSchema::default_schema(),
        None,
        None,
        Some(reference()),
        PipelineConfig::default(),
    );
    assert!(!context.is_scoring_enabled());

    let err = context.score(&sample_patient()).unwrap_err();
    assert_eq!(err, ScoreError::ClassificationUnavailable(InferenceError::NotLoaded));

    // Liveness still answers
    let status = context.status();
    assert!(!status.model_loaded);
    assert_eq!(status.status(), "degraded");
}

#[test]
fn test_classifier_failure_propagates() {
    let context = context_with(Box::new(FailingClassifier), Some(reference()));
    let err = context.score(&sample_patient()).unwrap_err();
    assert!(matches!(
        err,
        ScoreError::ClassificationUnavailable(InferenceError::Runtime(_))
    ));
}

#[test]
fn test_from_empty_artifact_dir() {
    let dir = tempfile::tempdir().unwrap();
    let paths = crate::logic::model::ArtifactPaths::in_dir(dir.path());
    let context = PipelineContext::load(&paths, PipelineConfig::default());

    assert!(!context.is_scoring_enabled());
    assert_eq!(context.schema().len(), 19);
    assert!(!context.report().model.is_loaded());
    assert!(context.score(&sample_patient()).is_err());
}

fn context_with_budget(budget_ms: Option<u64>) -> PipelineContext {
    let config = PipelineConfig {
        thresholds: ThresholdConfig::default(),
        explain: ExplainConfig { num_samples: 200, budget_ms, ..Default::default() },
    };
    PipelineContext::new(
        FeatureSchema::default_schema(),
        None,
        Some(Box::new(logistic(&[("age", 0.08)], -5.0))),
        Some(reference()),
        config,
    )
}

#[test]
fn test_explain_within_takes_tighter_budget() {
    let unbounded = context_with_budget(None);
    let prepared = unbounded.prepare(&sample_patient());
    assert!(unbounded.explain_within(prepared.vector(), Duration::from_secs(60)).is_ok());
    assert_eq!(
        unbounded.explain_within(prepared.vector(), Duration::ZERO).unwrap_err(),
        ExplainError::TimedOut { budget_ms: 0 }
    );

    // Configured budget wins when it is the tighter one
    let capped = context_with_budget(Some(0));
    assert_eq!(
        capped.explain_within(prepared.vector(), Duration::from_secs(60)).unwrap_err(),
        ExplainError::TimedOut { budget_ms: 0 }
    );
}
