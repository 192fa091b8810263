//! Feature Assembler
//!
//! CanonicalFields → FeatureVector theo đúng thứ tự schema.
//! One-hot được dựng trực tiếp (đúng một cột = 1 mỗi nhóm), cột thiếu = 0.

use serde::{Deserialize, Serialize};

use super::canonical::{CanonicalFields, NumericField};
use super::layout::{CategoricalEncoding, FeatureSchema};
use super::vector::FeatureVector;
use crate::logic::model::scaler::Scaler;

/// What happened at the scaling step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ScalingOutcome {
    NotConfigured,
    /// Only the scaled (continuous) columns were transformed
    Subset,
    Full,
    /// Scaler failed; the vector is unscaled
    Failed(String),
}

/// Assembled vector plus non-fatal diagnostics
#[derive(Debug, Clone)]
pub struct Assembly {
    pub vector: FeatureVector,
    /// Schema columns nothing produced (zero-filled)
    pub missing: Vec<String>,
    pub scaling: ScalingOutcome,
}

/// Build the classifier input for `fields`. Never fails.
pub fn assemble(fields: &CanonicalFields, schema: &FeatureSchema, scaler: Option<&Scaler>) -> Assembly {
    let mut vector = FeatureVector::zeros(schema);
    let mut produced = vec![false; schema.len()];

    for field in NumericField::ALL {
        if let Some(i) = schema.numeric_column(field) {
            vector.set(i, fields.numeric(field));
            produced[i] = true;
        }
    }

    // Schema validation guarantees every label has a column, so each group gets exactly one 1
    for encoding in schema.encodings() {
        match encoding {
            CategoricalEncoding::OneHot { field, columns } => {
                let label = fields.label(*field);
                for (column_label, column) in columns {
                    if let Some(i) = schema.index_of(column) {
                        vector.set(i, if column_label == label { 1.0 } else { 0.0 });
                        produced[i] = true;
                    }
                }
            }
            CategoricalEncoding::Flag { field, column, positive } => {
                if let Some(i) = schema.index_of(column) {
                    vector.set(i, if fields.label(*field) == positive { 1.0 } else { 0.0 });
                    produced[i] = true;
                }
            }
        }
    }

    let missing: Vec<String> = schema
        .names()
        .iter()
        .zip(&produced)
        .filter(|(_, done)| !**done)
        .map(|(name, _)| name.clone())
        .collect();

    if !missing.is_empty() {
        log::warn!("Features not produced by input (using 0): {:?}", missing);
    }

    let scaling = match scaler {
        Some(scaler) => apply_scaler(scaler, schema, &mut vector),
        None => ScalingOutcome::NotConfigured,
    };

    Assembly { vector, missing, scaling }
}

/// Subset transform when the scaler width equals the scaled column count,
/// otherwise the whole vector.
fn apply_scaler(scaler: &Scaler, schema: &FeatureSchema, vector: &mut FeatureVector) -> ScalingOutcome {
    let subset = schema.scaled_indices();

    let result = if !subset.is_empty() && scaler.width() == subset.len() {
        // Index-mapped by name through the schema, never by position
        let mut slice: Vec<f64> = subset.iter().map(|&i| vector.as_slice()[i]).collect();
        scaler.transform(&mut slice).map(|_| {
            for (&i, v) in subset.iter().zip(slice) {
                vector.set(i, v);
            }
            ScalingOutcome::Subset
        })
    } else {
        scaler.transform(vector.as_mut_slice()).map(|_| ScalingOutcome::Full)
    };

    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("Scaling failed: {}. Continuing without scaling.", e);
            ScalingOutcome::Failed(e.to_string())
        }
    }
}
