//! Surrogate fitter: sparse weighted linear approximation of the classifier
//! on a neighbourhood.
//!
//! 1. One batched `predict_proba` call over the whole neighbourhood.
//! 2. Features are mapped to the interpretable representation (standardised
//!    continuous values, "same category as the target" indicators).
//! 3. A weighted lasso is solved along a geometric regularisation path; the
//!    smallest penalty whose support fits the feature budget is kept.
//! 4. The support is optionally refit with a light ridge penalty to undo the
//!    lasso shrinkage, and the weighted R² is reported as local fidelity.

mod solver;

use crate::classifier::{Classifier, argmax, score_batch};
use crate::config::ExplainerConfig;
use crate::descriptor::FeatureSpace;
use crate::error::{ExplainError, Result};
use crate::types::{Instance, Neighborhood, SurrogateModel, SurrogateTerm};
use solver::{CoordinateDescent, WeightedDesign};
use tracing::debug;

/// Below this `lambda_max` the response carries no linear signal.
const FLAT_RESPONSE: f64 = 1e-12;

/// Which class probability the surrogate approximates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelChoice {
    /// The classifier's most probable class at the target.
    #[default]
    Predicted,
    /// A specific class index.
    Class(usize),
}

/// Fits `SurrogateModel`s under a fixed configuration.
#[derive(Debug, Clone)]
pub struct SurrogateFitter {
    config: ExplainerConfig,
}

impl SurrogateFitter {
    pub fn new(config: ExplainerConfig) -> Self {
        Self { config }
    }

    pub fn fit(
        &self,
        space: &FeatureSpace,
        neighborhood: &Neighborhood,
        classifier: &dyn Classifier,
        label: LabelChoice,
    ) -> Result<SurrogateModel> {
        let target = neighborhood
            .target()
            .ok_or(ExplainError::InsufficientSampleSize { requested: 0 })?;
        let instances: Vec<Instance> = neighborhood.instances().cloned().collect();

        let (probabilities, classes) = score_batch(classifier, &instances)?;
        let label = match label {
            LabelChoice::Class(c) if c < classes => c,
            LabelChoice::Class(c) => {
                return Err(ExplainError::invalid_config(format!(
                    "label {c} out of range for {classes} classes"
                )));
            }
            LabelChoice::Predicted => argmax(&probabilities[0]).unwrap_or(0),
        };
        let response: Vec<f64> = probabilities.iter().map(|row| row[label]).collect();

        let rows: Vec<Vec<f64>> = instances
            .iter()
            .map(|x| space.represent(&target.instance, x))
            .collect();
        let weights = neighborhood.weights();
        let design = WeightedDesign::new(&rows, &response, &weights);

        let (beta, lambda) = self.select(&design, space.len())?;

        let intercept = design.response_mean()
            - beta
                .iter()
                .zip(design.column_means())
                .map(|(b, m)| b * m)
                .sum::<f64>();
        let predict = |row: &[f64]| {
            intercept + row.iter().zip(&beta).map(|(x, b)| x * b).sum::<f64>()
        };

        let fidelity = weighted_r_squared(&rows, &response, &weights, &predict);
        let local_prediction = predict(&rows[0]);

        let terms: Vec<SurrogateTerm> = beta
            .iter()
            .enumerate()
            .filter(|(_, b)| **b != 0.0)
            .map(|(feature, &coefficient)| SurrogateTerm {
                feature,
                coefficient,
            })
            .collect();

        debug!(
            label,
            samples = rows.len(),
            selected = terms.len(),
            lambda,
            fidelity,
            "Fitted local surrogate"
        );

        Ok(SurrogateModel {
            label,
            terms,
            intercept,
            fidelity,
            target_probability: response[0],
            local_prediction,
            lambda,
        })
    }

    /// Walk the lasso path and return the coefficients of the smallest
    /// penalty whose support fits the budget, plus that penalty.
    fn select(&self, design: &WeightedDesign, num_features: usize) -> Result<(Vec<f64>, f64)> {
        let d = design.num_features();
        let budget = self.config.resolved_budget(num_features);
        let solver = CoordinateDescent {
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance,
        };

        let lambda_max = design.lambda_max();
        if lambda_max <= FLAT_RESPONSE {
            return Ok((vec![0.0; d], 0.0));
        }

        let all = vec![true; d];
        let mut beta = vec![0.0; d];
        let mut chosen = beta.clone();
        let mut chosen_lambda = lambda_max;
        let steps = self.config.path_length;
        for k in 0..steps {
            let lambda =
                lambda_max * self.config.path_min_ratio.powf(k as f64 / (steps - 1) as f64);
            solver.solve(design, &mut beta, &all, lambda, 0.0)?;
            let support = beta.iter().filter(|b| **b != 0.0).count();
            if support > budget {
                break;
            }
            chosen.copy_from_slice(&beta);
            chosen_lambda = lambda;
        }

        if self.config.refit_selected && chosen.iter().any(|b| *b != 0.0) {
            let active: Vec<bool> = chosen.iter().map(|b| *b != 0.0).collect();
            let l2 = self.config.ridge_alpha / design.total_weight();
            solver.solve(design, &mut chosen, &active, 0.0, l2)?;
        }

        if chosen.iter().any(|b| !b.is_finite()) {
            return Err(ExplainError::fit_failure("surrogate coefficients are not finite"));
        }
        Ok((chosen, chosen_lambda))
    }
}

/// Weighted coefficient of determination, clamped to `[0, 1]`.
///
/// A constant response that the surrogate reproduces exactly scores 1.
fn weighted_r_squared(
    rows: &[Vec<f64>],
    response: &[f64],
    weights: &[f64],
    predict: &dyn Fn(&[f64]) -> f64,
) -> f64 {
    let total: f64 = weights.iter().sum();
    let mean: f64 = response.iter().zip(weights).map(|(y, w)| y * w).sum::<f64>() / total;
    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for ((row, y), w) in rows.iter().zip(response).zip(weights) {
        ss_res += w * (y - predict(row)).powi(2);
        ss_tot += w * (y - mean).powi(2);
    }
    ss_res /= total;
    ss_tot /= total;

    if ss_tot <= 1e-24 {
        return if ss_res <= 1e-20 { 1.0 } else { 0.0 };
    }
    (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierError;
    use crate::descriptor::{ReferenceColumn, ReferenceTable};
    use crate::kernel::ProximityWeighter;
    use crate::sampler::PerturbationSampler;
    use crate::types::FeatureKind;

    fn unit_space(features: usize) -> FeatureSpace {
        let values: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let columns = (0..features)
            .map(|j| ReferenceColumn::observed(format!("x{j}"), FeatureKind::Continuous, &values))
            .collect();
        FeatureSpace::from_reference(&ReferenceTable::new(columns)).unwrap()
    }

    fn neighborhood(space: &FeatureSpace, target: &Instance, n: usize) -> Neighborhood {
        let rows = PerturbationSampler::default()
            .generate(space, target, n, 5)
            .unwrap();
        ProximityWeighter::for_dimension(space.len()).weigh(space, target, rows)
    }

    #[test]
    fn test_budget_limits_support() {
        let space = unit_space(6);
        let target = Instance::new(vec![0.0; 6]);
        let hood = neighborhood(&space, &target, 800);
        let linear = |batch: &[Instance]| -> std::result::Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(batch
                .iter()
                .map(|x| {
                    let v = x.values();
                    let p = 0.5 + 0.05 * v[0] - 0.04 * v[1] + 0.03 * v[2] - 0.02 * v[3]
                        + 0.01 * v[4];
                    vec![1.0 - p, p]
                })
                .collect())
        };
        let fitter = SurrogateFitter::new(ExplainerConfig {
            feature_budget: 2,
            ..Default::default()
        });
        let model = fitter
            .fit(&space, &hood, &linear, LabelChoice::Class(1))
            .unwrap();
        assert!(model.nonzero_count() <= 2);
        // The strongest effects enter the path first.
        assert!(model.coefficient(0).is_some());
        assert!(model.coefficient(1).is_some());
    }

    #[test]
    fn test_label_out_of_range() {
        let space = unit_space(2);
        let target = Instance::new(vec![0.0; 2]);
        let hood = neighborhood(&space, &target, 20);
        let constant = |batch: &[Instance]| -> std::result::Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(vec![vec![0.4, 0.6]; batch.len()])
        };
        let err = SurrogateFitter::new(ExplainerConfig::default())
            .fit(&space, &hood, &constant, LabelChoice::Class(2))
            .unwrap_err();
        assert!(matches!(err, ExplainError::InvalidConfig(_)));
    }

    #[test]
    fn test_predicted_label_is_argmax_at_target() {
        let space = unit_space(2);
        let target = Instance::new(vec![0.0; 2]);
        let hood = neighborhood(&space, &target, 20);
        let constant = |batch: &[Instance]| -> std::result::Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(vec![vec![0.2, 0.5, 0.3]; batch.len()])
        };
        let model = SurrogateFitter::new(ExplainerConfig::default())
            .fit(&space, &hood, &constant, LabelChoice::Predicted)
            .unwrap();
        assert_eq!(model.label, 1);
        assert_eq!(model.target_probability, 0.5);
        assert!(model.is_empty());
        assert!((model.intercept - 0.5).abs() < 1e-12);
        assert_eq!(model.fidelity, 1.0);
    }

    #[test]
    fn test_single_sample_neighbourhood() {
        let space = unit_space(3);
        let target = Instance::new(vec![0.5, 0.0, -0.5]);
        let hood = neighborhood(&space, &target, 1);
        let classifier = |batch: &[Instance]| -> std::result::Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(batch
                .iter()
                .map(|x| vec![0.5 - 0.1 * x.values()[0], 0.5 + 0.1 * x.values()[0]])
                .collect())
        };
        let model = SurrogateFitter::new(ExplainerConfig::default())
            .fit(&space, &hood, &classifier, LabelChoice::Predicted)
            .unwrap();
        assert!(model.is_empty());
        assert!((model.local_prediction - model.target_probability).abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_bounds() {
        let rows = vec![vec![0.0], vec![1.0], vec![2.0]];
        let y = [0.0, 1.0, 2.0];
        let w = [1.0, 1.0, 1.0];
        assert!((weighted_r_squared(&rows, &y, &w, &|r| r[0]) - 1.0).abs() < 1e-12);
        assert_eq!(weighted_r_squared(&rows, &y, &w, &|r| -10.0 * r[0]), 0.0);
        assert_eq!(weighted_r_squared(&rows, &[3.0; 3], &w, &|_| 3.0), 1.0);
        assert_eq!(weighted_r_squared(&rows, &[3.0; 3], &w, &|_| 2.0), 0.0);
    }
}
