//! Test doubles for the classifier trait

use ndarray::ArrayView2;
use parking_lot::Mutex;

use super::inference::{ClassifierOutput, InferenceError, LogisticModel, RiskClassifier};

/// Returns the same output for every call
pub struct FixedOutput {
    output: ClassifierOutput,
}

impl FixedOutput {
    pub fn new(output: ClassifierOutput) -> Self {
        Self { output }
    }
}

impl RiskClassifier for FixedOutput {
    fn name(&self) -> &str {
        "fixed"
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn infer(&self, _batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        Ok(self.output.clone())
    }
}

pub struct FailingClassifier;

impl RiskClassifier for FailingClassifier {
    fn name(&self) -> &str {
        "failing"
    }

    fn n_features(&self) -> Option<usize> {
        None
    }

    fn infer(&self, _batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        Err(InferenceError::Runtime("session crashed".to_string()))
    }
}

/// Logistic model that records every batch it is asked to score
pub struct RecordingClassifier {
    inner: LogisticModel,
    calls: Mutex<Vec<Vec<Vec<f64>>>>,
}

impl RecordingClassifier {
    pub fn new(inner: LogisticModel) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Rows of every call, in call order
    pub fn calls(&self) -> Vec<Vec<Vec<f64>>> {
        self.calls.lock().clone()
    }
}

impl RiskClassifier for RecordingClassifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn n_features(&self) -> Option<usize> {
        self.inner.n_features()
    }

    fn infer(&self, batch: ArrayView2<'_, f64>) -> Result<ClassifierOutput, InferenceError> {
        let rows = batch.rows().into_iter().map(|r| r.to_vec()).collect();
        self.calls.lock().push(rows);
        self.inner.infer(batch)
    }
}
