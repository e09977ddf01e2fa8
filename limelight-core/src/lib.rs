//! # limelight-core: Local explanations for black-box classifiers
//!
//! Explains one prediction of any probabilistic classifier by sampling a
//! neighbourhood around the instance, weighting each neighbour by proximity,
//! and fitting a sparse weighted linear surrogate whose coefficients are
//! reported as ranked feature contributions.
//!
//! ## Pipeline
//!
//! 1. [`FeatureSpace`]: per-feature statistics learned once from reference data
//! 2. [`PerturbationSampler`]: seeded synthetic neighbours around the target
//! 3. [`ProximityWeighter`]: exponential kernel over the interpretable distance
//! 4. [`SurrogateFitter`]: weighted lasso path plus ridge refit, with fidelity
//! 5. [`ExplanationAssembler`]: ranked, direction-labelled contributions
//!
//! [`LocalExplainer`] runs all five stages for a single request.

pub mod classifier;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod explainer;
pub mod explanation;
pub mod kernel;
pub mod sampler;
pub mod surrogate;
pub mod types;

// Re-exports
pub use classifier::{Classifier, ClassifierError, argmax};
pub use config::ExplainerConfig;
pub use descriptor::{FeatureSpace, ReferenceColumn, ReferenceTable};
pub use error::{ExplainError, Result};
pub use explainer::{ExplainRequest, ExplanationRun, LocalExplainer};
pub use explanation::{Contribution, Direction, Explanation, ExplanationAssembler};
pub use kernel::ProximityWeighter;
pub use sampler::PerturbationSampler;
pub use surrogate::{LabelChoice, SurrogateFitter};
pub use types::{
    FeatureDistribution, FeatureKind, FeatureSpec, Instance, NeighborSample, Neighborhood,
    SurrogateModel, SurrogateTerm,
};
