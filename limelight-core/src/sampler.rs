//! Perturbation sampler: synthetic neighbours around a target instance.

use crate::descriptor::FeatureSpace;
use crate::error::{ExplainError, Result};
use crate::types::{FeatureDistribution, Instance};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::debug;

/// Generates neighbourhoods by resampling every feature independently.
///
/// Continuous features get Gaussian noise scaled by their reference standard
/// deviation; categorical features are redrawn from their empirical marginal,
/// keeping the target's own code with probability `keep_fraction`.
#[derive(Debug, Clone, Copy)]
pub struct PerturbationSampler {
    keep_fraction: f64,
}

impl Default for PerturbationSampler {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl PerturbationSampler {
    pub fn new(keep_fraction: f64) -> Self {
        Self {
            keep_fraction: keep_fraction.clamp(0.0, 1.0),
        }
    }

    /// Produce `count` instances; the first is the target itself.
    ///
    /// The same seed, target and count always yield the same rows.
    pub fn generate(
        &self,
        space: &FeatureSpace,
        target: &Instance,
        count: usize,
        seed: u64,
    ) -> Result<Vec<Instance>> {
        if count == 0 {
            return Err(ExplainError::InsufficientSampleSize { requested: 0 });
        }
        space.check_instance(target)?;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut rows = Vec::with_capacity(count);
        rows.push(target.clone());

        for _ in 1..count {
            let values = space
                .specs()
                .iter()
                .enumerate()
                .map(|(j, spec)| {
                    let t = target.values()[j];
                    match &spec.distribution {
                        FeatureDistribution::Continuous { std_dev, .. } => {
                            let z: f64 = rng.sample(StandardNormal);
                            t + z * std_dev
                        }
                        FeatureDistribution::Categorical { .. } => {
                            if self.keep_fraction > 0.0 && rng.gen_bool(self.keep_fraction) {
                                t
                            } else {
                                space.draw(j, &mut rng)
                            }
                        }
                    }
                })
                .collect();
            rows.push(Instance::new(values));
        }

        debug!(count, seed, "Sampled perturbation neighbourhood");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ReferenceColumn, ReferenceTable};
    use crate::types::FeatureKind;

    fn space() -> FeatureSpace {
        let table = ReferenceTable::new(vec![
            ReferenceColumn::observed("score", FeatureKind::Continuous, &[0.0, 2.0, 4.0, 6.0]),
            ReferenceColumn::observed("smoker", FeatureKind::Categorical, &[0.0, 1.0, 1.0, 1.0]),
        ]);
        FeatureSpace::from_reference(&table).unwrap()
    }

    #[test]
    fn test_zero_samples_rejected() {
        let target = Instance::new(vec![3.0, 0.0]);
        let err = PerturbationSampler::default()
            .generate(&space(), &target, 0, 1)
            .unwrap_err();
        assert_eq!(err, ExplainError::InsufficientSampleSize { requested: 0 });
    }

    #[test]
    fn test_target_is_first_row() {
        let target = Instance::new(vec![3.0, 0.0]);
        let rows = PerturbationSampler::default()
            .generate(&space(), &target, 50, 9)
            .unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows[0], target);
        assert!(rows.iter().all(|r| r.len() == 2));
    }

    #[test]
    fn test_same_seed_same_neighbourhood() {
        let target = Instance::new(vec![3.0, 1.0]);
        let sampler = PerturbationSampler::new(0.3);
        let a = sampler.generate(&space(), &target, 200, 11).unwrap();
        let b = sampler.generate(&space(), &target, 200, 11).unwrap();
        let c = sampler.generate(&space(), &target, 200, 12).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_keep_fraction_one_preserves_categories() {
        let target = Instance::new(vec![3.0, 0.0]);
        let rows = PerturbationSampler::new(1.0)
            .generate(&space(), &target, 100, 3)
            .unwrap();
        assert!(rows.iter().all(|r| r.values()[1] == 0.0));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let target = Instance::new(vec![3.0]);
        assert!(matches!(
            PerturbationSampler::default().generate(&space(), &target, 10, 1),
            Err(ExplainError::InvalidConfig(_))
        ));
    }
}
