//! Risk Tier Thresholds
//!
//! Bảng breakpoint cố định: [0, low) → Low, [low, high) → Moderate, [high, 1] → High.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discrete risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Moderate,
    High,
}

impl RiskTier {
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "Low",
            RiskTier::Moderate => "Moderate",
            RiskTier::High => "High",
        }
    }

    /// Display colour
    pub fn color(self) -> &'static str {
        match self {
            RiskTier::Low => "green",
            RiskTier::Moderate => "orange",
            RiskTier::High => "red",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid risk breakpoints: need 0 <= low ({low}) <= high ({high}) <= 1")]
pub struct ThresholdError {
    pub low: f64,
    pub high: f64,
}

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Lower bound of Moderate
    pub low_cut: f64,
    /// Lower bound of High
    pub high_cut: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            low_cut: 0.3,
            high_cut: 0.7,
        }
    }
}

impl ThresholdConfig {
    pub fn new(low_cut: f64, high_cut: f64) -> Result<Self, ThresholdError> {
        let config = Self { low_cut, high_cut };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ThresholdError> {
        let ok = self.low_cut.is_finite()
            && self.high_cut.is_finite()
            && (0.0..=1.0).contains(&self.low_cut)
            && (0.0..=1.0).contains(&self.high_cut)
            && self.low_cut <= self.high_cut;
        if ok {
            Ok(())
        } else {
            Err(ThresholdError {
                low: self.low_cut,
                high: self.high_cut,
            })
        }
    }

    /// Tier for a probability. Monotonic in `probability`.
    pub fn tier(&self, probability: f64) -> RiskTier {
        if probability < self.low_cut {
            RiskTier::Low
        } else if probability < self.high_cut {
            RiskTier::Moderate
        } else {
            RiskTier::High
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_config() {
        let config = ThresholdConfig::default();
        assert_eq!(config.low_cut, 0.3);
        assert_eq!(config.high_cut, 0.7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_tiering_with_custom_breakpoints() {
        let config = ThresholdConfig::new(0.3, 0.6).unwrap();
        assert_eq!(config.tier(0.05), RiskTier::Low);
        assert_eq!(config.tier(0.45), RiskTier::Moderate);
        assert_eq!(config.tier(0.95), RiskTier::High);
        // Boundaries belong to the upper tier
        assert_eq!(config.tier(0.3), RiskTier::Moderate);
        assert_eq!(config.tier(0.6), RiskTier::High);
        assert_eq!(config.tier(1.0), RiskTier::High);
    }

    #[test]
    fn test_tiering_is_monotonic() {
        let config = ThresholdConfig::default();
        let mut previous = RiskTier::Low;
        for i in 0..=100 {
            let tier = config.tier(i as f64 / 100.0);
            assert!(tier >= previous);
            previous = tier;
        }
    }

    #[test]
    fn test_rejects_bad_breakpoints() {
        assert!(ThresholdConfig::new(0.7, 0.3).is_err());
        assert!(ThresholdConfig::new(-0.1, 0.5).is_err());
        assert!(ThresholdConfig::new(0.2, 1.5).is_err());
        assert!(ThresholdConfig::new(f64::NAN, 0.5).is_err());
        assert!(ThresholdConfig::new(0.5, 0.5).is_ok());
    }

    #[test]
    fn test_tier_colors() {
        assert_eq!(RiskTier::Low.color(), "green");
        assert_eq!(RiskTier::Moderate.color(), "orange");
        assert_eq!(RiskTier::High.color(), "red");
        assert_eq!(RiskTier::High.to_string(), "High");
    }
}
