//! Data model shared by the explanation pipeline stages.

use serde::{Deserialize, Serialize};

/// Whether a feature is treated as a real value or as a finite set of codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Continuous,
    Categorical,
}

/// Empirical distribution of one feature in the reference dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureDistribution {
    Continuous {
        mean: f64,
        /// Population standard deviation (ddof 0).
        std_dev: f64,
    },
    Categorical {
        /// Distinct observed codes, ascending.
        values: Vec<f64>,
        /// Marginal frequency of each code; sums to 1.
        frequencies: Vec<f64>,
    },
}

/// Descriptor of a single input feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub distribution: FeatureDistribution,
}

impl FeatureSpec {
    pub fn kind(&self) -> FeatureKind {
        match self.distribution {
            FeatureDistribution::Continuous { .. } => FeatureKind::Continuous,
            FeatureDistribution::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    /// Divisor used to standardise continuous values; 1 for zero-variance or
    /// categorical features.
    pub fn scale(&self) -> f64 {
        match self.distribution {
            FeatureDistribution::Continuous { std_dev, .. } if std_dev > 0.0 => std_dev,
            _ => 1.0,
        }
    }
}

/// An ordered feature vector, either the real input or a synthetic neighbour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Instance(Vec<f64>);

impl Instance {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.0.get(index).copied()
    }
}

impl From<Vec<f64>> for Instance {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// One synthetic neighbour with its distance to, and similarity weight against, the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborSample {
    pub instance: Instance,
    pub distance: f64,
    pub weight: f64,
}

/// The weighted sample set around a target. Row 0 is always the target itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    samples: Vec<NeighborSample>,
}

impl Neighborhood {
    pub(crate) fn from_samples(samples: Vec<NeighborSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[NeighborSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The zero-distance reference sample.
    pub fn target(&self) -> Option<&NeighborSample> {
        self.samples.first()
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.samples.iter().map(|s| &s.instance)
    }

    pub fn weights(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.weight).collect()
    }
}

/// A single nonzero term of the surrogate model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurrogateTerm {
    pub feature: usize,
    pub coefficient: f64,
}

/// Sparse weighted linear approximation of the classifier around one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateModel {
    /// Class index whose probability was approximated.
    pub label: usize,
    /// Nonzero terms, ascending by feature index.
    pub terms: Vec<SurrogateTerm>,
    pub intercept: f64,
    /// Weighted R² of the surrogate on the neighbourhood, in `[0, 1]`.
    pub fidelity: f64,
    /// Classifier probability for `label` at the target.
    pub target_probability: f64,
    /// Surrogate prediction at the target.
    pub local_prediction: f64,
    /// Regularisation strength selected on the lasso path.
    pub lambda: f64,
}

impl SurrogateModel {
    pub fn nonzero_count(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn coefficient(&self, feature: usize) -> Option<f64> {
        self.terms
            .iter()
            .find(|t| t.feature == feature)
            .map(|t| t.coefficient)
    }
}
