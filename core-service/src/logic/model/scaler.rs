//! Feature Scaler
//!
//! Normalization parameters từ training (StandardScaler / MinMaxScaler).
//! Transform không bao giờ sửa dữ liệu nửa chừng: lỗi thì input giữ nguyên.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScalerError {
    #[error("scaler expects {expected} features, got {actual}")]
    WidthMismatch { expected: usize, actual: usize },
    #[error("scaler parameters are inconsistent: {0}")]
    InvalidParams(String),
    #[error("scaled value for column {0} is not finite")]
    NonFinite(usize),
}

/// Fitted scaler, tagged by kind in its JSON artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scaler {
    /// (x - mean) / scale
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// (x - min) / (max - min)
    MinMax { min: Vec<f64>, max: Vec<f64> },
}

impl Scaler {
    /// Expected input width
    pub fn width(&self) -> usize {
        match self {
            Scaler::Standard { mean, .. } => mean.len(),
            Scaler::MinMax { min, .. } => min.len(),
        }
    }

    pub fn validate(&self) -> Result<(), ScalerError> {
        let (a, b, what) = match self {
            Scaler::Standard { mean, scale } => (mean, scale, "mean/scale"),
            Scaler::MinMax { min, max } => (min, max, "min/max"),
        };
        if a.is_empty() {
            return Err(ScalerError::InvalidParams("no parameters".to_string()));
        }
        if a.len() != b.len() {
            return Err(ScalerError::InvalidParams(format!(
                "{} lengths differ ({} vs {})",
                what,
                a.len(),
                b.len()
            )));
        }
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(ScalerError::InvalidParams(format!("{} contains non-finite values", what)));
        }
        Ok(())
    }

    /// Transform in place. On error `values` is left untouched.
    pub fn transform(&self, values: &mut [f64]) -> Result<(), ScalerError> {
        if values.len() != self.width() {
            return Err(ScalerError::WidthMismatch {
                expected: self.width(),
                actual: values.len(),
            });
        }

        let mut scaled = Vec::with_capacity(values.len());
        for (i, &x) in values.iter().enumerate() {
            let v = match self {
                Scaler::Standard { mean, scale } => {
                    // Zero-variance columns keep unit scale
                    let s = if scale[i] == 0.0 { 1.0 } else { scale[i] };
                    (x - mean[i]) / s
                }
                Scaler::MinMax { min, max } => {
                    let range = max[i] - min[i];
                    let range = if range == 0.0 { 1.0 } else { range };
                    (x - min[i]) / range
                }
            };
            if !v.is_finite() {
                return Err(ScalerError::NonFinite(i));
            }
            scaled.push(v);
        }

        values.copy_from_slice(&scaled);
        Ok(())
    }
}
