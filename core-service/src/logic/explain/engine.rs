//! Local Explanation Engine
//!
//! Perturb quanh instance → hỏi classifier một lần (batch) → kernel weighting →
//! weighted ridge trên không gian interpretable → top-k feature theo |contribution|.

use std::time::Instant;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::regression::weighted_ridge;
use super::sampler::{DistributionModel, ReferenceSample};
use super::types::{Direction, ExplainError, Explanation, ExplanationItem, LocalFit};
use crate::logic::config::ExplainConfig;
use crate::logic::features::{FeatureKind, FeatureSchema, FeatureVector};
use crate::logic::model::InferenceError;

/// Ridge penalty of the surrogate
const RIDGE_ALPHA: f64 = 1.0;

struct EngineState {
    config: ExplainConfig,
    schema: FeatureSchema,
    model: DistributionModel,
    kernel_width: f64,
}

/// Explainer for one schema. Disabled when no reference sample was loaded.
pub struct ExplanationEngine {
    state: Option<EngineState>,
}

impl std::fmt::Debug for ExplanationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplanationEngine")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

impl ExplanationEngine {
    pub fn disabled() -> Self {
        Self { state: None }
    }

    pub fn new(reference: Option<ReferenceSample>, schema: &FeatureSchema, config: &ExplainConfig) -> Self {
        let Some(reference) = reference else {
            return Self::disabled();
        };
        if !config.enabled {
            log::info!("Explanations disabled by configuration");
            return Self::disabled();
        }

        let model = DistributionModel::fit(&reference, schema, config.discretize_continuous);
        log::info!(
            "Explanation engine ready ({} reference rows, {} samples, top {})",
            reference.rows(),
            config.num_samples,
            config.top_k
        );

        Self {
            state: Some(EngineState {
                config: config.clone(),
                schema: schema.clone(),
                model,
                kernel_width: config.kernel_width_for(schema.len()),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.is_some()
    }

    /// Explain one instance using only the classifier's probability function
    pub fn explain<F>(&self, instance: &FeatureVector, predict_proba: F) -> Result<Explanation, ExplainError>
    where
        F: FnMut(ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError>,
    {
        let budget_ms = self.state.as_ref().and_then(|state| state.config.budget_ms);
        self.explain_with_budget(instance, budget_ms, predict_proba)
    }

    /// Same as `explain`, with `budget_ms` replacing the configured budget
    pub fn explain_with_budget<F>(
        &self,
        instance: &FeatureVector,
        budget_ms: Option<u64>,
        mut predict_proba: F,
    ) -> Result<Explanation, ExplainError>
    where
        F: FnMut(ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError>,
    {
        let state = self.state.as_ref().ok_or(ExplainError::Disabled)?;
        let config = &state.config;
        let started = Instant::now();

        if instance.len() != state.model.width() {
            return Err(ExplainError::DegenerateSample(format!(
                "instance width {} does not match reference width {}",
                instance.len(),
                state.model.width()
            )));
        }
        if config.num_samples < 2 {
            return Err(ExplainError::DegenerateSample("need at least 2 samples".to_string()));
        }

        let mut rng = StdRng::seed_from_u64(config.random_state);
        let hood = state.model.sample(instance.as_slice(), config.num_samples, &mut rng);
        check_budget(budget_ms, started)?;

        let predictions = predict_proba(hood.raw.view())?;
        if predictions.len() != config.num_samples {
            return Err(ExplainError::InvalidOutput(format!(
                "{} predictions for {} samples",
                predictions.len(),
                config.num_samples
            )));
        }
        if predictions.iter().any(|p| !p.is_finite()) {
            return Err(ExplainError::InvalidOutput("non-finite probability".to_string()));
        }
        check_budget(budget_ms, started)?;

        // sqrt(exp(-d²/width²)) on interpretable-space distance to the instance row
        let origin = hood.interpretable.row(0);
        let width_sq = state.kernel_width * state.kernel_width;
        let weights: Vec<f64> = hood
            .interpretable
            .rows()
            .into_iter()
            .map(|row| {
                let d_sq: f64 = row.iter().zip(origin.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (-d_sq / width_sq).exp().sqrt()
            })
            .collect();

        let fit = weighted_ridge(hood.interpretable.view(), &predictions, &weights, RIDGE_ALPHA)?;

        let instance_interp = state.model.interpretable_instance(instance.as_slice());
        let local_prediction = fit.predict(&instance_interp);

        let mut ranked: Vec<(usize, f64)> = fit
            .coefficients
            .iter()
            .zip(&instance_interp)
            .map(|(beta, x)| beta * x)
            .enumerate()
            .filter(|(_, c)| *c != 0.0)
            .collect();
        // Stable: ties keep schema order
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked.truncate(config.top_k);

        let items = ranked
            .into_iter()
            .map(|(j, contribution)| ExplanationItem {
                feature_name: state.schema.names()[j].clone(),
                human_rule: human_rule(state, j, instance.as_slice()[j]),
                signed_contribution: contribution,
                direction: Direction::from_sign(contribution),
            })
            .collect();

        log::debug!(
            "Explanation computed in {} ms (local R² {:.3})",
            started.elapsed().as_millis(),
            fit.score
        );

        Ok(Explanation {
            items,
            local_fit: LocalFit {
                intercept: fit.intercept,
                score: fit.score,
                local_prediction,
            },
        })
    }
}

fn check_budget(budget_ms: Option<u64>, started: Instant) -> Result<(), ExplainError> {
    match budget_ms {
        Some(budget_ms) if started.elapsed().as_millis() >= u128::from(budget_ms) => {
            Err(ExplainError::TimedOut { budget_ms })
        }
        _ => Ok(()),
    }
}

fn format_value(x: f64) -> String {
    if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{:.2}", x)
    }
}

/// `age <= 45.00`, `45.00 < age <= 61.00`, `age > 61.00`, `smokes=1`
/// `j` is a schema column: coefficients are one per column
fn human_rule(state: &EngineState, j: usize, x: f64) -> String {
    let name = &state.schema.names()[j];

    if let (Some(edges), Some(bin)) = (state.model.edges(j), state.model.bin(j, x)) {
        return match bin {
            0 => format!("{} <= {:.2}", name, edges[0]),
            1 => format!("{:.2} < {} <= {:.2}", edges[0], name, edges[1]),
            2 => format!("{:.2} < {} <= {:.2}", edges[1], name, edges[2]),
            _ => format!("{} > {:.2}", name, edges[2]),
        };
    }

    match state.schema.kind(j) {
        Some(FeatureKind::Continuous) => format!("{} = {:.2}", name, x),
        _ => format!("{}={}", name, format_value(x)),
    }
}
