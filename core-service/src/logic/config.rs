//! Pipeline Configuration
//!
//! Risk breakpoints + explanation parameters.
//! Nguồn: file JSON (`PIPELINE_CONFIG`) rồi env override. Giá trị sai → default + warning.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::logic::model::ThresholdConfig;

/// Local explanation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    pub enabled: bool,
    /// Perturbed neighbors per explanation (instance included)
    pub num_samples: usize,
    pub top_k: usize,
    /// Kernel width; `None` means 0.75·sqrt(feature count)
    pub kernel_width: Option<f64>,
    /// Quartile-bin continuous features
    pub discretize_continuous: bool,
    pub random_state: u64,
    /// Cooperative time budget
    pub budget_ms: Option<u64>,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_samples: 500,
            top_k: 5,
            kernel_width: None,
            discretize_continuous: true,
            random_state: 42,
            budget_ms: None,
        }
    }
}

impl ExplainConfig {
    pub fn kernel_width_for(&self, feature_count: usize) -> f64 {
        self.kernel_width
            .unwrap_or_else(|| 0.75 * (feature_count as f64).sqrt())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub thresholds: ThresholdConfig,
    pub explain: ExplainConfig,
}

impl PipelineConfig {
    /// `PIPELINE_CONFIG` file (if any) with env overrides on top
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
        let config: Self =
            serde_json::from_str(&text).map_err(|e| format!("cannot parse {}: {}", path.display(), e))?;
        Ok(config.sanitized())
    }

    /// Same as `from_env` with an injectable variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = match lookup("PIPELINE_CONFIG").filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::from_file(Path::new(&path)).unwrap_or_else(|e| {
                log::warn!("Ignoring pipeline config file: {}", e);
                Self::default()
            }),
            None => Self::default(),
        };

        let mut thresholds = config.thresholds;
        override_with(&lookup, "RISK_LOW_CUT", &mut thresholds.low_cut);
        override_with(&lookup, "RISK_HIGH_CUT", &mut thresholds.high_cut);
        config.thresholds = thresholds;

        let explain = &mut config.explain;
        override_with(&lookup, "EXPLAIN_ENABLED", &mut explain.enabled);
        override_with(&lookup, "EXPLAIN_SAMPLES", &mut explain.num_samples);
        override_with(&lookup, "EXPLAIN_TOP_K", &mut explain.top_k);
        override_with(&lookup, "EXPLAIN_RANDOM_STATE", &mut explain.random_state);
        override_option(&lookup, "EXPLAIN_KERNEL_WIDTH", &mut explain.kernel_width);
        override_option(&lookup, "EXPLAIN_BUDGET_MS", &mut explain.budget_ms);

        config.sanitized()
    }

    /// Replace out-of-range values with defaults
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if let Err(e) = self.thresholds.validate() {
            log::warn!("{}; using {:?}", e, defaults.thresholds);
            self.thresholds = defaults.thresholds;
        }
        if self.explain.num_samples < 2 {
            log::warn!("num_samples {} too small; using {}", self.explain.num_samples, defaults.explain.num_samples);
            self.explain.num_samples = defaults.explain.num_samples;
        }
        if self.explain.top_k == 0 {
            log::warn!("top_k must be positive; using {}", defaults.explain.top_k);
            self.explain.top_k = defaults.explain.top_k;
        }
        if let Some(width) = self.explain.kernel_width {
            if !(width.is_finite() && width > 0.0) {
                log::warn!("kernel_width {} invalid; using default", width);
                self.explain.kernel_width = None;
            }
        }
        self
    }
}

fn override_with<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => log::warn!("Invalid {}={:?}; keeping default", key, raw),
        }
    }
}

fn override_option<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut Option<T>,
) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = Some(value),
            Err(_) => log::warn!("Invalid {}={:?}; keeping default", key, raw),
        }
    }
}
