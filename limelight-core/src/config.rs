//! Configuration for the explanation engine.
//!
//! Every field carries a serde default so partial TOML/env layers deserialize
//! cleanly on top of the built-in values.

use crate::error::{ExplainError, Result};
use serde::{Deserialize, Serialize};

/// Tunables for neighbourhood sampling, weighting and the sparse surrogate fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainerConfig {
    /// Neighbourhood size, including the target row.
    #[serde(default = "default_num_samples")]
    pub num_samples: usize,
    /// Maximum number of nonzero surrogate coefficients.
    #[serde(default = "default_feature_budget")]
    pub feature_budget: usize,
    /// Number of explanation entries to keep (defaults to the feature budget).
    #[serde(default)]
    pub top_k: Option<usize>,
    /// Exponential kernel bandwidth (defaults to `0.75 * sqrt(feature count)`).
    #[serde(default)]
    pub kernel_width: Option<f64>,
    /// Probability that a categorical feature keeps the target's own value.
    #[serde(default)]
    pub categorical_keep_fraction: f64,
    /// Seed for the per-request sampler.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Coordinate-descent sweep limit per regularisation step.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold on the largest coefficient change in a sweep.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Number of points on the lasso regularisation path.
    #[serde(default = "default_path_length")]
    pub path_length: usize,
    /// Ratio between the smallest and largest lambda on the path.
    #[serde(default = "default_path_min_ratio")]
    pub path_min_ratio: f64,
    /// L2 penalty used when refitting the selected support, against the
    /// unnormalised weighted sum of squares.
    #[serde(default = "default_ridge_alpha")]
    pub ridge_alpha: f64,
    /// Refit the selected features without the L1 penalty.
    #[serde(default = "default_true")]
    pub refit_selected: bool,
    /// Fidelity below which an explanation is flagged as untrustworthy.
    #[serde(default = "default_min_fidelity")]
    pub min_fidelity: f64,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            num_samples: default_num_samples(),
            feature_budget: default_feature_budget(),
            top_k: None,
            kernel_width: None,
            categorical_keep_fraction: 0.0,
            seed: default_seed(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            path_length: default_path_length(),
            path_min_ratio: default_path_min_ratio(),
            ridge_alpha: default_ridge_alpha(),
            refit_selected: true,
            min_fidelity: default_min_fidelity(),
        }
    }
}

impl ExplainerConfig {
    /// Reject values the pipeline cannot work with.
    ///
    /// `num_samples == 0` is not rejected here: it is reported per request as
    /// `InsufficientSampleSize`.
    pub fn validate(&self) -> Result<()> {
        if self.feature_budget == 0 {
            return Err(ExplainError::invalid_config("feature_budget must be at least 1"));
        }
        if self.top_k == Some(0) {
            return Err(ExplainError::invalid_config("top_k must be at least 1"));
        }
        if let Some(width) = self.kernel_width {
            if !(width.is_finite() && width > 0.0) {
                return Err(ExplainError::invalid_config(format!(
                    "kernel_width must be positive and finite, got {width}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.categorical_keep_fraction) {
            return Err(ExplainError::invalid_config(format!(
                "categorical_keep_fraction must lie in [0, 1], got {}",
                self.categorical_keep_fraction
            )));
        }
        if self.max_iterations == 0 {
            return Err(ExplainError::invalid_config("max_iterations must be at least 1"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(ExplainError::invalid_config("tolerance must be positive"));
        }
        if self.path_length < 2 {
            return Err(ExplainError::invalid_config("path_length must be at least 2"));
        }
        if !(self.path_min_ratio > 0.0 && self.path_min_ratio < 1.0) {
            return Err(ExplainError::invalid_config(
                "path_min_ratio must lie strictly between 0 and 1",
            ));
        }
        if !(self.ridge_alpha.is_finite() && self.ridge_alpha >= 0.0) {
            return Err(ExplainError::invalid_config("ridge_alpha must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.min_fidelity) {
            return Err(ExplainError::invalid_config("min_fidelity must lie in [0, 1]"));
        }
        Ok(())
    }

    /// Kernel bandwidth for a feature space of the given dimensionality.
    pub fn resolved_kernel_width(&self, num_features: usize) -> f64 {
        self.kernel_width
            .unwrap_or_else(|| 0.75 * (num_features.max(1) as f64).sqrt())
    }

    /// Effective feature budget, bounded by the number of features.
    pub fn resolved_budget(&self, num_features: usize) -> usize {
        self.feature_budget.min(num_features)
    }

    /// Number of explanation entries to keep.
    pub fn resolved_top_k(&self) -> usize {
        self.top_k.unwrap_or(self.feature_budget)
    }
}

fn default_num_samples() -> usize {
    5000
}

fn default_feature_budget() -> usize {
    10
}

fn default_seed() -> u64 {
    42
}

fn default_max_iterations() -> usize {
    1000
}

fn default_tolerance() -> f64 {
    1e-7
}

fn default_path_length() -> usize {
    100
}

fn default_path_min_ratio() -> f64 {
    1e-4
}

fn default_ridge_alpha() -> f64 {
    1.0
}

fn default_min_fidelity() -> f64 {
    0.5
}

fn default_true() -> bool {
    true
}
