//! Reference Sample & Perturbation Sampler
//!
//! Ước lượng phân phối từng cột từ reference sample, rồi sinh neighbors quanh
//! instance. One-hot group được sample theo tần suất, luôn đúng một cột = 1.

use ndarray::{Array2, ArrayView1};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;

use super::types::ExplainError;
use crate::logic::features::{FeatureKind, FeatureSchema};

// ============================================================================
// REFERENCE SAMPLE
// ============================================================================

/// Read-only rows in classifier input space, one column per schema feature
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSample {
    data: Array2<f64>,
}

impl ReferenceSample {
    pub fn new(data: Array2<f64>, schema: &FeatureSchema) -> Result<Self, ExplainError> {
        if data.nrows() < 2 {
            return Err(ExplainError::DegenerateSample(format!(
                "need at least 2 rows, got {}",
                data.nrows()
            )));
        }
        if data.ncols() != schema.len() {
            return Err(ExplainError::DegenerateSample(format!(
                "row width {} does not match schema width {}",
                data.ncols(),
                schema.len()
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(ExplainError::DegenerateSample("contains non-finite values".to_string()));
        }
        Ok(Self { data })
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }
}

// ============================================================================
// COLUMN MODELS
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct BinStats {
    mean: f64,
    std: f64,
    lower: f64,
    upper: f64,
}

#[derive(Debug, Clone)]
pub(crate) enum ColumnModel {
    /// No spread in the reference sample: held at the instance value
    Fixed,
    /// Quartile bins; neighbors pick a bin by frequency then a value inside it
    Binned {
        edges: [f64; 3],
        bins: Vec<BinStats>,
        weights: WeightedIndex<f64>,
    },
    /// mean + z·std
    Gaussian { mean: f64, std: f64 },
    /// Observed values by frequency
    Discrete { values: Vec<f64>, weights: WeightedIndex<f64> },
    /// Sampled through its one-hot group
    GroupMember(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct GroupModel {
    members: Vec<usize>,
    weights: Option<WeightedIndex<f64>>,
}

/// Neighbors in raw (classifier) space and interpretable space; row 0 is the instance
#[derive(Debug, Clone)]
pub struct Neighborhood {
    pub raw: Array2<f64>,
    pub interpretable: Array2<f64>,
}

/// Per-column distribution estimated from the reference sample
#[derive(Debug, Clone)]
pub struct DistributionModel {
    columns: Vec<ColumnModel>,
    groups: Vec<GroupModel>,
}

/// Linear-interpolated percentile of sorted values
fn percentile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

/// Bin index: number of edges strictly below `value`
fn bin_of(edges: &[f64; 3], value: f64) -> usize {
    edges.iter().filter(|&&e| e < value).count()
}

/// Standard normal via Box–Muller
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn continuous_model(column: ArrayView1<'_, f64>, discretize: bool) -> ColumnModel {
    let mut sorted: Vec<f64> = column.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let (mean, std) = mean_std(&sorted);

    if std == 0.0 {
        return ColumnModel::Fixed;
    }
    if !discretize {
        return ColumnModel::Gaussian { mean, std };
    }

    let edges = [
        percentile(&sorted, 0.25),
        percentile(&sorted, 0.50),
        percentile(&sorted, 0.75),
    ];
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let mut members: [Vec<f64>; 4] = Default::default();
    for &v in &sorted {
        members[bin_of(&edges, v)].push(v);
    }

    let bins: Vec<BinStats> = members
        .iter()
        .enumerate()
        .map(|(b, values)| {
            let lower = if b == 0 { min } else { edges[b - 1] };
            let upper = if b == 3 { max } else { edges[b] };
            let (mean, std) = if values.is_empty() {
                ((lower + upper) / 2.0, 0.0)
            } else {
                mean_std(values)
            };
            BinStats { mean, std, lower, upper }
        })
        .collect();

    match WeightedIndex::new(members.iter().map(|m| m.len() as f64)) {
        Ok(weights) => ColumnModel::Binned { edges, bins, weights },
        Err(_) => ColumnModel::Fixed,
    }
}

fn discrete_model(column: ArrayView1<'_, f64>) -> ColumnModel {
    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &v in column.iter() {
        match counts.iter_mut().find(|(value, _)| *value == v) {
            Some((_, count)) => *count += 1,
            None => counts.push((v, 1)),
        }
    }
    if counts.len() < 2 {
        return ColumnModel::Fixed;
    }
    counts.sort_by(|a, b| a.0.total_cmp(&b.0));

    match WeightedIndex::new(counts.iter().map(|(_, c)| *c as f64)) {
        Ok(weights) => ColumnModel::Discrete {
            values: counts.into_iter().map(|(v, _)| v).collect(),
            weights,
        },
        Err(_) => ColumnModel::Fixed,
    }
}

impl DistributionModel {
    pub fn fit(reference: &ReferenceSample, schema: &FeatureSchema, discretize: bool) -> Self {
        let data = reference.data();

        let columns = (0..schema.len())
            .map(|j| match schema.kind(j) {
                Some(FeatureKind::Continuous) => continuous_model(data.column(j), discretize),
                Some(FeatureKind::OneHot(group)) => ColumnModel::GroupMember(group),
                _ => discrete_model(data.column(j)),
            })
            .collect();

        let groups = schema
            .groups()
            .iter()
            .map(|members| {
                // Frequency of the hot member per reference row; rows with none hot are skipped
                let mut counts = vec![0.0; members.len()];
                for row in data.rows() {
                    if let Some(k) = members.iter().position(|&c| row[c] > 0.5) {
                        counts[k] += 1.0;
                    }
                }
                let distinct = counts.iter().filter(|&&c| c > 0.0).count();
                let weights = if distinct >= 2 { WeightedIndex::new(&counts).ok() } else { None };
                GroupModel {
                    members: members.clone(),
                    weights,
                }
            })
            .collect();

        Self { columns, groups }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn column(&self, j: usize) -> &ColumnModel {
        &self.columns[j]
    }

    /// Quartile edges of a binned column
    pub fn edges(&self, j: usize) -> Option<[f64; 3]> {
        match self.columns.get(j) {
            Some(ColumnModel::Binned { edges, .. }) => Some(*edges),
            _ => None,
        }
    }

    /// Draw `n` rows around `instance`. Row 0 is the instance itself.
    pub fn sample(&self, instance: &[f64], n: usize, rng: &mut StdRng) -> Neighborhood {
        let width = self.width();
        let mut raw = Array2::zeros((n, width));
        let mut interpretable = Array2::zeros((n, width));

        for (j, model) in self.columns.iter().enumerate() {
            let x = instance[j];
            raw[[0, j]] = x;
            interpretable[[0, j]] = match model {
                ColumnModel::Gaussian { mean, std } => (x - mean) / std,
                _ => 1.0,
            };
        }

        for i in 1..n {
            for (j, model) in self.columns.iter().enumerate() {
                let x = instance[j];
                let (value, interp) = match model {
                    ColumnModel::Fixed => (x, 1.0),
                    ColumnModel::Binned { edges, bins, weights } => {
                        let b = weights.sample(rng);
                        let stats = &bins[b];
                        let value = (stats.mean + standard_normal(rng) * stats.std).clamp(stats.lower, stats.upper);
                        (value, if b == bin_of(edges, x) { 1.0 } else { 0.0 })
                    }
                    ColumnModel::Gaussian { mean, std } => {
                        let value = mean + standard_normal(rng) * std;
                        (value, (value - mean) / std)
                    }
                    ColumnModel::Discrete { values, weights } => {
                        let value = values[weights.sample(rng)];
                        (value, if value == x { 1.0 } else { 0.0 })
                    }
                    // Filled by the group pass below
                    ColumnModel::GroupMember(_) => continue,
                };
                raw[[i, j]] = value;
                interpretable[[i, j]] = interp;
            }

            for group in &self.groups {
                match &group.weights {
                    Some(weights) => {
                        let hot = weights.sample(rng);
                        for (k, &c) in group.members.iter().enumerate() {
                            let value = if k == hot { 1.0 } else { 0.0 };
                            raw[[i, c]] = value;
                            interpretable[[i, c]] = if value == instance[c] { 1.0 } else { 0.0 };
                        }
                    }
                    None => {
                        for &c in &group.members {
                            raw[[i, c]] = instance[c];
                            interpretable[[i, c]] = 1.0;
                        }
                    }
                }
            }
        }

        Neighborhood { raw, interpretable }
    }

    /// Instance coordinates in interpretable space
    pub fn interpretable_instance(&self, instance: &[f64]) -> Vec<f64> {
        self.columns
            .iter()
            .zip(instance)
            .map(|(model, &x)| match model {
                ColumnModel::Gaussian { mean, std } => (x - mean) / std,
                _ => 1.0,
            })
            .collect()
    }

    /// Bin of `value` in a binned column
    pub fn bin(&self, j: usize, value: f64) -> Option<usize> {
        self.edges(j).map(|edges| bin_of(&edges, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn reference() -> (FeatureSchema, ReferenceSample) {
        let schema = FeatureSchema::default_schema();
        let rows = 40;
        let data = Array2::from_shape_fn((rows, schema.len()), |(i, j)| match j {
            0 => 20.0 + i as f64 * 1.5,
            3 => 80.0 + (i % 10) as f64 * 15.0,
            4 => 25.0, // no spread
            1 => (i % 3 == 0) as u8 as f64,
            6 => (i % 2 == 0) as u8 as f64,
            7 => (i % 2 == 1) as u8 as f64,
            8 => 1.0, // everyone private
            13 => (i % 4 != 0) as u8 as f64,
            14 => (i % 4 == 0) as u8 as f64,
            j if (15..19).contains(&j) => (i % 4 == j - 15) as u8 as f64,
            _ => 0.0,
        });
        let reference = ReferenceSample::new(data, &schema).unwrap();
        (schema, reference)
    }

    #[test]
    fn test_reference_validation() {
        let schema = FeatureSchema::default_schema();
        assert!(ReferenceSample::new(Array2::zeros((1, schema.len())), &schema).is_err());
        assert!(ReferenceSample::new(Array2::zeros((5, 3)), &schema).is_err());
        let mut bad = Array2::zeros((5, schema.len()));
        bad[[2, 2]] = f64::INFINITY;
        assert!(ReferenceSample::new(bad, &schema).is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&sorted, 0.5), 3.0);
        assert_eq!(percentile(&sorted, 0.25), 2.0);
        assert_eq!(percentile(&[0.0, 10.0], 0.25), 2.5);
    }

    #[test]
    fn test_column_models() {
        let (schema, reference) = reference();
        let model = DistributionModel::fit(&reference, &schema, true);
        assert!(matches!(model.column(0), ColumnModel::Binned { .. }));
        assert!(matches!(model.column(4), ColumnModel::Fixed));
        assert!(matches!(model.column(1), ColumnModel::Discrete { .. }));
        assert!(matches!(model.column(8), ColumnModel::GroupMember(_)));

        let gaussian = DistributionModel::fit(&reference, &schema, false);
        assert!(matches!(gaussian.column(0), ColumnModel::Gaussian { .. }));
    }

    #[test]
    fn test_neighbors_keep_one_hot_exclusive() {
        let (schema, reference) = reference();
        let model = DistributionModel::fit(&reference, &schema, true);
        let instance = reference.data().row(3).to_vec();
        let mut rng = StdRng::seed_from_u64(42);

        let hood = model.sample(&instance, 200, &mut rng);
        assert_eq!(hood.raw.dim(), (200, schema.len()));
        assert_eq!(hood.raw.row(0).to_vec(), instance);

        for row in hood.raw.rows() {
            for members in schema.groups() {
                let sum: f64 = members.iter().map(|&c| row[c]).sum();
                assert_eq!(sum, 1.0);
            }
            // Zero-spread column held at the instance
            assert_eq!(row[4], 25.0);
        }
    }

    #[test]
    fn test_binned_values_stay_in_observed_range() {
        let (schema, reference) = reference();
        let model = DistributionModel::fit(&reference, &schema, true);
        let instance = reference.data().row(0).to_vec();
        let hood = model.sample(&instance, 300, &mut StdRng::seed_from_u64(7));
        for v in hood.raw.column(0) {
            assert!((20.0..=78.5).contains(v), "age {} out of range", v);
        }
        // Instance row is all ones in interpretable space
        assert!(hood.interpretable.row(0).iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_sampling_is_seeded() {
        let (schema, reference) = reference();
        let model = DistributionModel::fit(&reference, &schema, true);
        let instance = reference.data().row(5).to_vec();
        let a = model.sample(&instance, 50, &mut StdRng::seed_from_u64(42));
        let b = model.sample(&instance, 50, &mut StdRng::seed_from_u64(42));
        assert_eq!(a.raw, b.raw);
    }
}
