//! Proximity weighting of neighbourhood samples.

use crate::descriptor::FeatureSpace;
use crate::types::{FeatureKind, Instance, NeighborSample, Neighborhood};

/// Exponential kernel over the distance in the interpretable representation.
///
/// `weight = sqrt(exp(-d² / width²))`, so the target (d = 0) gets exactly 1
/// and weight strictly decreases with distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityWeighter {
    width: f64,
}

impl ProximityWeighter {
    pub fn new(width: f64) -> Self {
        Self { width }
    }

    /// Kernel with the conventional `0.75 * sqrt(d)` bandwidth.
    pub fn for_dimension(num_features: usize) -> Self {
        Self::new(0.75 * (num_features.max(1) as f64).sqrt())
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn kernel(&self, distance: f64) -> f64 {
        let w = (-(distance * distance) / (self.width * self.width)).exp().sqrt();
        // Far neighbours underflow to zero; weights must stay strictly positive.
        w.max(f64::MIN_POSITIVE)
    }

    /// Distance between a neighbour and the target: Euclidean over
    /// standardised continuous differences plus categorical mismatches.
    pub fn distance(space: &FeatureSpace, target: &Instance, neighbor: &Instance) -> f64 {
        space
            .specs()
            .iter()
            .zip(target.values().iter().zip(neighbor.values()))
            .map(|(spec, (&t, &x))| {
                let d = match spec.kind() {
                    FeatureKind::Continuous => (x - t) / spec.scale(),
                    FeatureKind::Categorical => {
                        if x == t {
                            0.0
                        } else {
                            1.0
                        }
                    }
                };
                d * d
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Attach distances and weights to sampled rows. Row 0 must be the target.
    pub fn weigh(
        &self,
        space: &FeatureSpace,
        target: &Instance,
        rows: Vec<Instance>,
    ) -> Neighborhood {
        let samples = rows
            .into_iter()
            .map(|instance| {
                let distance = Self::distance(space, target, &instance);
                NeighborSample {
                    weight: self.kernel(distance),
                    distance,
                    instance,
                }
            })
            .collect();
        Neighborhood::from_samples(samples)
    }
}
