//! Pipeline Context
//!
//! Toàn bộ artifact đã load (schema, scaler, classifier, explainer) trong một object
//! bất biến, tạo một lần lúc startup rồi share qua `Arc`.

use std::time::Duration;

use thiserror::Error;

use super::result::{aggregate, Diagnostics, PredictionResult};
use crate::logic::config::PipelineConfig;
use crate::logic::explain::{ExplainError, Explanation, ExplanationEngine, ReferenceSample};
use crate::logic::features::{assemble, canonicalize, Assembly, CanonicalFields, FeatureSchema, FeatureVector, RawInput};
use crate::logic::model::{
    load_artifacts, ArtifactPaths, ClassifierAdapter, InferenceError, LoadReport, LoadResult, RiskClassifier, Scaler,
    Scored,
};
use crate::logic::status::StatusReport;

/// The only failure `score()` surfaces
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(#[source] InferenceError),
}

impl From<InferenceError> for ScoreError {
    fn from(err: InferenceError) -> Self {
        ScoreError::ClassificationUnavailable(err)
    }
}

/// Canonical fields + assembled vector for one request
#[derive(Debug, Clone)]
pub struct Prepared {
    pub fields: CanonicalFields,
    pub assembly: Assembly,
}

impl Prepared {
    pub fn vector(&self) -> &FeatureVector {
        &self.assembly.vector
    }

    pub fn diagnostics(&self) -> Diagnostics {
        Diagnostics {
            defaulted_fields: self.fields.defaulted.iter().map(|s| s.to_string()).collect(),
            missing_columns: self.assembly.missing.clone(),
            scaling: self.assembly.scaling.clone(),
            probability_from_label: false,
        }
    }
}

#[derive(Debug)]
pub struct PipelineContext {
    schema: FeatureSchema,
    scaler: Option<Scaler>,
    classifier: Option<ClassifierAdapter>,
    explainer: ExplanationEngine,
    config: PipelineConfig,
    report: LoadReport,
}

impl PipelineContext {
    pub fn new(
        schema: FeatureSchema,
        scaler: Option<Scaler>,
        classifier: Option<Box<dyn RiskClassifier>>,
        reference: Option<ReferenceSample>,
        config: PipelineConfig,
    ) -> Self {
        let explainer = ExplanationEngine::new(reference, &schema, &config.explain);
        let classifier = classifier.map(|c| ClassifierAdapter::new(c, config.thresholds));
        Self {
            schema,
            scaler,
            classifier,
            explainer,
            config,
            report: LoadReport::default(),
        }
    }

    pub fn from_artifacts(loaded: LoadResult, config: PipelineConfig) -> Self {
        let LoadResult {
            classifier,
            scaler,
            schema,
            reference,
            report,
        } = loaded;
        let mut context = Self::new(schema, scaler, classifier, reference, config);
        context.report = report;
        context
    }

    /// Discover artifacts and build the context
    pub fn load(paths: &ArtifactPaths, config: PipelineConfig) -> Self {
        Self::from_artifacts(load_artifacts(paths), config)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn is_scoring_enabled(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn is_explainer_enabled(&self) -> bool {
        self.explainer.is_enabled() && self.classifier.is_some()
    }

    /// Canonicalize + assemble. Never fails.
    pub fn prepare(&self, raw: &RawInput) -> Prepared {
        let fields = canonicalize(raw);
        let assembly = assemble(&fields, &self.schema, self.scaler.as_ref());
        log::debug!(
            "Prepared vector ({} defaulted, {} missing, scaling {:?})",
            fields.defaulted.len(),
            assembly.missing.len(),
            assembly.scaling
        );
        Prepared { fields, assembly }
    }

    pub fn classify(&self, vector: &FeatureVector) -> Result<Scored, ScoreError> {
        let classifier = self.classifier.as_ref().ok_or(InferenceError::NotLoaded)?;
        Ok(classifier.score(vector, &self.schema)?)
    }

    pub fn explain(&self, vector: &FeatureVector) -> Result<Explanation, ExplainError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(ExplainError::Classifier(InferenceError::NotLoaded))?;
        self.explainer
            .explain(vector, |batch| classifier.predict_proba_batch(batch))
    }

    /// `explain` capped at `budget` (the tighter of this and the configured budget)
    pub fn explain_within(&self, vector: &FeatureVector, budget: Duration) -> Result<Explanation, ExplainError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(ExplainError::Classifier(InferenceError::NotLoaded))?;
        let cap = u64::try_from(budget.as_millis()).unwrap_or(u64::MAX);
        let budget_ms = Some(self.config.explain.budget_ms.map_or(cap, |configured| configured.min(cap)));
        self.explainer
            .explain_with_budget(vector, budget_ms, |batch| classifier.predict_proba_batch(batch))
    }

    /// Full pipeline. Only classifier unavailability is an error.
    pub fn score(&self, raw: &RawInput) -> Result<PredictionResult, ScoreError> {
        let prepared = self.prepare(raw);
        let scored = self.classify(prepared.vector())?;

        let explanation = if self.explainer.is_enabled() {
            match self.explain(prepared.vector()) {
                Ok(explanation) => Some(explanation),
                Err(e) => {
                    log::warn!("Explanation unavailable: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(aggregate(scored, explanation, prepared.diagnostics()))
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            model_loaded: self.classifier.is_some(),
            scaler_loaded: self.scaler.is_some(),
            explainer_available: self.is_explainer_enabled(),
            classifier: self.classifier.as_ref().map(|c| c.stats()),
            layout: self.schema.info(),
            thresholds: self.config.thresholds,
            artifacts: self.report.clone(),
            checked_at: chrono::Utc::now(),
        }
    }
}
