//! Weighted ridge regression for the local surrogate
//!
//! Normal equations (Xcᵀ W Xc + αI) β = Xcᵀ W yc trên dữ liệu đã center theo
//! weighted mean; giải bằng Gaussian elimination với partial pivoting.

use ndarray::ArrayView2;

use super::types::ExplainError;

/// Pivots below this are treated as singular
const PIVOT_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct RidgeFit {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    /// Weighted R²
    pub score: f64,
}

impl RidgeFit {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.intercept + row.iter().zip(&self.coefficients).map(|(x, b)| x * b).sum::<f64>()
    }
}

/// Fit `y ≈ intercept + x·β` with sample weights `w` and L2 penalty `alpha`
#[allow(clippy::needless_range_loop)]
pub fn weighted_ridge(x: ArrayView2<'_, f64>, y: &[f64], w: &[f64], alpha: f64) -> Result<RidgeFit, ExplainError> {
    let (m, n) = x.dim();
    if m == 0 || y.len() != m || w.len() != m {
        return Err(ExplainError::DegenerateSample(format!(
            "regression needs matching rows (x: {}, y: {}, w: {})",
            m,
            y.len(),
            w.len()
        )));
    }

    let w_sum: f64 = w.iter().sum();
    if !(w_sum > 0.0) {
        return Err(ExplainError::DegenerateSample("sample weights sum to zero".to_string()));
    }

    // Weighted means
    let y_mean = y.iter().zip(w).map(|(yi, wi)| yi * wi).sum::<f64>() / w_sum;
    let mut x_mean = vec![0.0; n];
    for (row, &wi) in x.rows().into_iter().zip(w) {
        for j in 0..n {
            x_mean[j] += wi * row[j];
        }
    }
    for v in &mut x_mean {
        *v /= w_sum;
    }

    let mut xtx = vec![vec![0.0; n]; n];
    let mut xty = vec![0.0; n];

    for (i, row) in x.rows().into_iter().enumerate() {
        let wi = w[i];
        let yc = y[i] - y_mean;
        for j in 0..n {
            let xj = row[j] - x_mean[j];
            xty[j] += wi * xj * yc;
            for k in j..n {
                xtx[j][k] += wi * xj * (row[k] - x_mean[k]);
            }
        }
    }

    // Symmetric fill + regularization
    for j in 0..n {
        for k in 0..j {
            xtx[j][k] = xtx[k][j];
        }
        xtx[j][j] += alpha;
    }

    let coefficients = solve_linear_system(xtx, xty)?;
    let intercept = y_mean - x_mean.iter().zip(&coefficients).map(|(m, b)| m * b).sum::<f64>();

    let mut fit = RidgeFit {
        coefficients,
        intercept,
        score: 0.0,
    };

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (i, row) in x.rows().into_iter().enumerate() {
        let predicted = fit.intercept + row.iter().zip(&fit.coefficients).map(|(x, b)| x * b).sum::<f64>();
        ss_res += w[i] * (y[i] - predicted).powi(2);
        ss_tot += w[i] * (y[i] - y_mean).powi(2);
    }
    fit.score = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(fit)
}

/// Solve `a·x = b` by Gaussian elimination with partial pivoting
#[allow(clippy::needless_range_loop)]
pub fn solve_linear_system(a: Vec<Vec<f64>>, b: Vec<f64>) -> Result<Vec<f64>, ExplainError> {
    let n = b.len();
    let mut aug: Vec<Vec<f64>> = a
        .into_iter()
        .zip(b)
        .map(|(mut row, bi)| {
            row.push(bi);
            row
        })
        .collect();

    // Forward elimination
    for i in 0..n {
        let mut max_row = i;
        for k in (i + 1)..n {
            if aug[k][i].abs() > aug[max_row][i].abs() {
                max_row = k;
            }
        }
        aug.swap(i, max_row);

        let pivot = aug[i][i];
        if !(pivot.abs() >= PIVOT_EPSILON) {
            return Err(ExplainError::Singular);
        }

        for k in (i + 1)..n {
            let factor = aug[k][i] / pivot;
            for j in i..=n {
                aug[k][j] -= factor * aug[i][j];
            }
        }
    }

    // Back substitution
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }
    Ok(x)
}
