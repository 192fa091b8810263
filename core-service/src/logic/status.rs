//! Engine Status
//!
//! Snapshot liveness/readiness cho health check: model, scaler, explainer,
//! schema version + layout hash, fingerprint của từng artifact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::logic::features::LayoutInfo;
use crate::logic::model::{ArtifactStatus, ClassifierStats, LoadReport, ThresholdConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub model_loaded: bool,
    pub scaler_loaded: bool,
    pub explainer_available: bool,
    pub classifier: Option<ClassifierStats>,
    pub layout: LayoutInfo,
    pub thresholds: ThresholdConfig,
    pub artifacts: LoadReport,
    pub checked_at: DateTime<Utc>,
}

impl StatusReport {
    /// "healthy" with a classifier, "degraded" without (the service still answers)
    pub fn status(&self) -> &'static str {
        if self.model_loaded {
            "healthy"
        } else {
            "degraded"
        }
    }

    /// Artifacts that were present but could not be used
    pub fn failed_artifacts(&self) -> Vec<(&'static str, &str)> {
        let a = &self.artifacts;
        [
            ("model", &a.model),
            ("scaler", &a.scaler),
            ("schema", &a.schema),
            ("reference_sample", &a.reference_sample),
        ]
        .into_iter()
        .filter_map(|(name, status)| match status {
            ArtifactStatus::Failed { error, .. } => Some((name, error.as_str())),
            _ => None,
        })
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::config::PipelineConfig;
    use crate::logic::features::FeatureSchema;
    use crate::logic::model::LogisticModel;
    use crate::logic::pipeline::PipelineContext;

    #[test]
    fn test_degraded_without_classifier() {
        let context = PipelineContext::new(FeatureSchema::default_schema(), None, None, None, PipelineConfig::default());
        let status = context.status();
        assert!(!status.model_loaded);
        assert!(!status.explainer_available);
        assert_eq!(status.status(), "degraded");
        assert_eq!(status.layout.feature_count, 19);
        assert!(status.failed_artifacts().is_empty());
    }

    #[test]
    fn test_healthy_with_classifier() {
        let model = LogisticModel { coefficients: vec![0.0; 19], intercept: 0.0 };
        let context = PipelineContext::new(
            FeatureSchema::default_schema(),
            None,
            Some(Box::new(model)),
            None,
            PipelineConfig::default(),
        );
        let status = context.status();
        assert_eq!(status.status(), "healthy");
        assert_eq!(status.classifier.as_ref().map(|c| c.inference_count), Some(0));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["artifacts"]["model"]["status"], "missing");
    }

    #[test]
    fn test_failed_artifacts_listed() {
        let mut context_report = LoadReport::default();
        context_report.scaler = ArtifactStatus::Failed {
            path: "scaler.json".to_string(),
            error: "bad json".to_string(),
        };
        let status = StatusReport {
            model_loaded: false,
            scaler_loaded: false,
            explainer_available: false,
            classifier: None,
            layout: FeatureSchema::default_schema().info(),
            thresholds: ThresholdConfig::default(),
            artifacts: context_report,
            checked_at: Utc::now(),
        };
        assert_eq!(status.failed_artifacts(), vec![("scaler", "bad json")]);
    }
}
