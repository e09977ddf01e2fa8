//! Feature space descriptor: per-feature reference statistics used to
//! generate realistic perturbations.
//!
//! Built once from the reference (training) table and never mutated afterwards,
//! so a single instance can be shared across concurrent requests behind an `Arc`.

use crate::error::{ExplainError, Result};
use crate::types::{FeatureDistribution, FeatureKind, FeatureSpec, Instance};
use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// One column of the reference dataset. `None` marks a missing observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceColumn {
    pub name: String,
    pub kind: FeatureKind,
    pub values: Vec<Option<f64>>,
}

impl ReferenceColumn {
    pub fn new(name: impl Into<String>, kind: FeatureKind, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            kind,
            values,
        }
    }

    /// Convenience constructor for fully observed columns.
    pub fn observed(name: impl Into<String>, kind: FeatureKind, values: &[f64]) -> Self {
        Self::new(name, kind, values.iter().copied().map(Some).collect())
    }
}

/// The reference dataset, ordered by feature.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTable {
    columns: Vec<ReferenceColumn>,
}

impl ReferenceTable {
    pub fn new(columns: Vec<ReferenceColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ReferenceColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }
}

/// Read-only statistics for every feature, in instance order.
#[derive(Debug, Clone)]
pub struct FeatureSpace {
    specs: Vec<FeatureSpec>,
    // Prebuilt marginal samplers, `Some` for categorical features only.
    marginals: Vec<Option<WeightedIndex<f64>>>,
}

impl FeatureSpace {
    /// Compute per-feature statistics from the reference table.
    pub fn from_reference(table: &ReferenceTable) -> Result<Self> {
        let columns = table.columns();
        if columns.is_empty() {
            return Err(ExplainError::invalid_reference("reference dataset has no columns"));
        }
        let rows = table.row_count();
        if rows == 0 {
            return Err(ExplainError::invalid_reference("reference dataset has no rows"));
        }

        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(columns.len());
        let mut marginals = Vec::with_capacity(columns.len());

        for column in columns {
            if !seen.insert(column.name.as_str()) {
                return Err(ExplainError::invalid_reference(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            if column.values.len() != rows {
                return Err(ExplainError::invalid_reference(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.values.len(),
                    rows
                )));
            }

            let observed: Vec<f64> = column
                .values
                .iter()
                .flatten()
                .copied()
                .filter(|v| v.is_finite())
                .collect();
            if observed.is_empty() {
                return Err(ExplainError::invalid_reference(format!(
                    "column '{}' has no observed values",
                    column.name
                )));
            }

            let (distribution, marginal) = match column.kind {
                FeatureKind::Continuous => (continuous_stats(&observed), None),
                FeatureKind::Categorical => {
                    let (values, frequencies) = categorical_stats(observed);
                    let marginal = WeightedIndex::new(frequencies.iter().copied()).map_err(|e| {
                        ExplainError::invalid_reference(format!(
                            "column '{}' has unusable frequencies: {e}",
                            column.name
                        ))
                    })?;
                    (
                        FeatureDistribution::Categorical {
                            values,
                            frequencies,
                        },
                        Some(marginal),
                    )
                }
            };

            specs.push(FeatureSpec {
                name: column.name.clone(),
                distribution,
            });
            marginals.push(marginal);
        }

        debug!(features = specs.len(), rows, "Built feature space descriptor");
        Ok(Self { specs, marginals })
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }

    pub fn describe(&self, feature: usize) -> Option<&FeatureSpec> {
        self.specs.get(feature)
    }

    /// Draw `count` values from the feature's empirical marginal.
    ///
    /// Categorical features draw codes by observed frequency; continuous
    /// features use the Gaussian with the observed mean and deviation.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        feature: usize,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<f64>> {
        if feature >= self.specs.len() {
            return Err(ExplainError::invalid_config(format!(
                "feature index {feature} out of range for {} features",
                self.specs.len()
            )));
        }
        Ok((0..count).map(|_| self.draw(feature, rng)).collect())
    }

    pub(crate) fn draw<R: Rng + ?Sized>(&self, feature: usize, rng: &mut R) -> f64 {
        match (&self.specs[feature].distribution, &self.marginals[feature]) {
            (FeatureDistribution::Categorical { values, .. }, Some(marginal)) => {
                values[marginal.sample(rng)]
            }
            (FeatureDistribution::Categorical { values, .. }, None) => values[0],
            (FeatureDistribution::Continuous { mean, std_dev }, _) => {
                let z: f64 = rng.sample(StandardNormal);
                mean + z * std_dev
            }
        }
    }

    /// Check that an instance has this space's dimensionality and finite values.
    pub fn check_instance(&self, instance: &Instance) -> Result<()> {
        if instance.len() != self.specs.len() {
            return Err(ExplainError::invalid_config(format!(
                "instance has {} features, feature space has {}",
                instance.len(),
                self.specs.len()
            )));
        }
        if let Some(i) = instance.values().iter().position(|v| !v.is_finite()) {
            return Err(ExplainError::invalid_config(format!(
                "instance value for '{}' is not finite",
                self.specs[i].name
            )));
        }
        Ok(())
    }

    /// Interpretable representation of `instance` relative to `target`:
    /// standardised values for continuous features, "same category as the
    /// target" indicators for categorical ones.
    pub fn represent(&self, target: &Instance, instance: &Instance) -> Vec<f64> {
        self.specs
            .iter()
            .zip(target.values().iter().zip(instance.values()))
            .map(|(spec, (&t, &x))| match &spec.distribution {
                FeatureDistribution::Continuous { mean, .. } => (x - mean) / spec.scale(),
                FeatureDistribution::Categorical { .. } => {
                    if x == t {
                        1.0
                    } else {
                        0.0
                    }
                }
            })
            .collect()
    }
}

fn continuous_stats(observed: &[f64]) -> FeatureDistribution {
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;
    let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    FeatureDistribution::Continuous {
        mean,
        std_dev: variance.sqrt(),
    }
}

fn categorical_stats(mut observed: Vec<f64>) -> (Vec<f64>, Vec<f64>) {
    observed.sort_by(|a, b| a.total_cmp(b));
    let total = observed.len() as f64;
    let mut values: Vec<f64> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    for v in observed {
        match values.last() {
            Some(&last) if last == v => {
                if let Some(c) = counts.last_mut() {
                    *c += 1;
                }
            }
            _ => {
                values.push(v);
                counts.push(1);
            }
        }
    }
    let frequencies = counts.into_iter().map(|c| c as f64 / total).collect();
    (values, frequencies)
}
