//! Weighted elastic-net coordinate descent.
//!
//! Minimises, over centred data with weights normalised to sum to one,
//!
//! ```text
//! 1/2 Σ wᵢ (yᵢ − xᵢ·β)² + l1 Σ |βⱼ| + l2/2 Σ βⱼ²
//! ```
//!
//! with the per-coordinate update
//!
//! ```text
//! ρⱼ = Σ wᵢ xᵢⱼ rᵢ + hⱼ βⱼ        (hⱼ = Σ wᵢ xᵢⱼ²)
//! βⱼ = soft_threshold(ρⱼ, l1) / (hⱼ + l2)
//! ```

use crate::error::{ExplainError, Result};

/// Centred, column-major design with normalised sample weights.
#[derive(Debug, Clone)]
pub(crate) struct WeightedDesign {
    columns: Vec<Vec<f64>>,
    response: Vec<f64>,
    weights: Vec<f64>,
    column_means: Vec<f64>,
    response_mean: f64,
    curvature: Vec<f64>,
    total_weight: f64,
}

impl WeightedDesign {
    /// `rows[i]` is the representation of sample `i`; `weights` are raw kernel weights.
    pub(crate) fn new(rows: &[Vec<f64>], response: &[f64], weights: &[f64]) -> Self {
        let n = rows.len();
        let d = rows.first().map_or(0, Vec::len);
        let total_weight: f64 = weights.iter().sum();
        let weights: Vec<f64> = weights.iter().map(|w| w / total_weight).collect();

        let response_mean: f64 = response.iter().zip(&weights).map(|(y, w)| y * w).sum();
        let response = response.iter().map(|y| y - response_mean).collect();

        let mut columns = Vec::with_capacity(d);
        let mut column_means = Vec::with_capacity(d);
        let mut curvature = Vec::with_capacity(d);
        for j in 0..d {
            let mean: f64 = (0..n).map(|i| rows[i][j] * weights[i]).sum();
            let column: Vec<f64> = (0..n).map(|i| rows[i][j] - mean).collect();
            let h: f64 = column.iter().zip(&weights).map(|(x, w)| w * x * x).sum();
            columns.push(column);
            column_means.push(mean);
            // Columns that are constant up to rounding carry no signal.
            curvature.push(if h > 1e-14 { h } else { 0.0 });
        }

        Self {
            columns,
            response,
            weights,
            column_means,
            response_mean,
            curvature,
            total_weight,
        }
    }

    pub(crate) fn num_features(&self) -> usize {
        self.columns.len()
    }

    pub(crate) fn column_means(&self) -> &[f64] {
        &self.column_means
    }

    pub(crate) fn response_mean(&self) -> f64 {
        self.response_mean
    }

    pub(crate) fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Smallest L1 penalty at which every coefficient is zero.
    pub(crate) fn lambda_max(&self) -> f64 {
        self.columns
            .iter()
            .zip(&self.curvature)
            .filter(|(_, h)| **h > 0.0)
            .map(|(column, _)| self.weighted_dot(column, &self.response).abs())
            .fold(0.0, f64::max)
    }

    fn weighted_dot(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .zip(&self.weights)
            .map(|((x, y), w)| w * x * y)
            .sum()
    }

    fn residual(&self, beta: &[f64]) -> Vec<f64> {
        let mut r = self.response.clone();
        for (column, &b) in self.columns.iter().zip(beta) {
            if b != 0.0 {
                for (ri, x) in r.iter_mut().zip(column) {
                    *ri -= x * b;
                }
            }
        }
        r
    }
}

/// Cyclic coordinate descent with a bounded number of sweeps.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoordinateDescent {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl CoordinateDescent {
    /// Solve in place starting from `beta` (warm start). Coordinates with
    /// `active[j] == false` are held at zero. Returns the number of sweeps.
    pub(crate) fn solve(
        &self,
        design: &WeightedDesign,
        beta: &mut [f64],
        active: &[bool],
        l1: f64,
        l2: f64,
    ) -> Result<usize> {
        for (b, &on) in beta.iter_mut().zip(active) {
            if !on {
                *b = 0.0;
            }
        }
        let mut residual = design.residual(beta);

        for sweep in 1..=self.max_iterations {
            let mut max_delta = 0.0_f64;
            for j in 0..design.num_features() {
                let h = design.curvature[j];
                if !active[j] || h == 0.0 {
                    beta[j] = 0.0;
                    continue;
                }
                let column = &design.columns[j];
                let rho = design.weighted_dot(column, &residual) + h * beta[j];
                let updated = soft_threshold(rho, l1) / (h + l2);
                let delta = updated - beta[j];
                if delta != 0.0 {
                    for (ri, x) in residual.iter_mut().zip(column) {
                        *ri -= x * delta;
                    }
                    beta[j] = updated;
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if !max_delta.is_finite() {
                return Err(ExplainError::fit_failure(
                    "coordinate descent diverged to a non-finite coefficient",
                ));
            }
            if max_delta <= self.tolerance {
                return Ok(sweep);
            }
        }

        Err(ExplainError::fit_failure(format!(
            "coordinate descent did not converge within {} sweeps (l1 = {l1:.3e})",
            self.max_iterations
        )))
    }
}

/// Soft-thresholding operator: `S(x, λ) = sign(x) · max(|x| − λ, 0)`.
#[inline]
pub(crate) fn soft_threshold(x: f64, threshold: f64) -> f64 {
    if x > threshold {
        x - threshold
    } else if x < -threshold {
        x + threshold
    } else {
        0.0
    }
}
