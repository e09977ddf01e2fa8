//! The local explanation pipeline: sample → weigh → fit → assemble.

use crate::classifier::Classifier;
use crate::config::ExplainerConfig;
use crate::descriptor::FeatureSpace;
use crate::error::Result;
use crate::explanation::{Explanation, ExplanationAssembler};
use crate::kernel::ProximityWeighter;
use crate::sampler::PerturbationSampler;
use crate::surrogate::{LabelChoice, SurrogateFitter};
use crate::types::{Instance, Neighborhood, SurrogateModel};
use std::sync::Arc;
use tracing::{info, warn};

/// Per-request overrides of the configured defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplainRequest {
    pub seed: Option<u64>,
    pub num_samples: Option<usize>,
    pub label: LabelChoice,
}

impl ExplainRequest {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = Some(num_samples);
        self
    }

    pub fn with_label(mut self, label: usize) -> Self {
        self.label = LabelChoice::Class(label);
        self
    }
}

/// Everything one explanation request produced, for callers that want more
/// than the ranked contributions.
#[derive(Debug, Clone)]
pub struct ExplanationRun {
    pub neighborhood: Neighborhood,
    pub surrogate: SurrogateModel,
    pub explanation: Explanation,
}

/// Explains single predictions of any `Classifier` over one feature space.
///
/// Holds only immutable state; share it freely between threads.
#[derive(Debug, Clone)]
pub struct LocalExplainer {
    space: Arc<FeatureSpace>,
    config: ExplainerConfig,
}

impl LocalExplainer {
    pub fn new(space: Arc<FeatureSpace>, config: ExplainerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { space, config })
    }

    pub fn space(&self) -> &FeatureSpace {
        &self.space
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    /// Explain the classifier's behaviour around `target`.
    pub fn explain(
        &self,
        target: &Instance,
        classifier: &dyn Classifier,
        request: ExplainRequest,
    ) -> Result<Explanation> {
        self.run(target, classifier, request).map(|run| run.explanation)
    }

    /// Like [`explain`](Self::explain) but also returns the neighbourhood and surrogate.
    pub fn run(
        &self,
        target: &Instance,
        classifier: &dyn Classifier,
        request: ExplainRequest,
    ) -> Result<ExplanationRun> {
        let seed = request.seed.unwrap_or(self.config.seed);
        let count = request.num_samples.unwrap_or(self.config.num_samples);

        let neighborhood = self.neighborhood(target, count, seed)?;
        let surrogate = SurrogateFitter::new(self.config.clone()).fit(
            &self.space,
            &neighborhood,
            classifier,
            request.label,
        )?;
        let explanation = ExplanationAssembler::new(
            self.config.resolved_top_k(),
            self.config.min_fidelity,
        )
        .assemble(&surrogate, &self.space, target);

        if explanation.is_low_fidelity() {
            warn!(
                fidelity = explanation.fidelity,
                threshold = self.config.min_fidelity,
                "Local surrogate has low fidelity; explanation may be untrustworthy"
            );
        }
        info!(
            label = explanation.label,
            samples = neighborhood.len(),
            contributions = explanation.contributions.len(),
            fidelity = explanation.fidelity,
            "Explanation complete"
        );

        Ok(ExplanationRun {
            neighborhood,
            surrogate,
            explanation,
        })
    }

    /// Sample and weight a neighbourhood without consulting a classifier.
    pub fn neighborhood(&self, target: &Instance, count: usize, seed: u64) -> Result<Neighborhood> {
        let rows = PerturbationSampler::new(self.config.categorical_keep_fraction).generate(
            &self.space,
            target,
            count,
            seed,
        )?;
        let weighter =
            ProximityWeighter::new(self.config.resolved_kernel_width(self.space.len()));
        Ok(weighter.weigh(&self.space, target, rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierError;
    use crate::descriptor::{ReferenceColumn, ReferenceTable};
    use crate::error::ExplainError;
    use crate::types::FeatureKind;

    fn explainer(config: ExplainerConfig) -> LocalExplainer {
        let table = ReferenceTable::new(vec![
            ReferenceColumn::observed("gad_score", FeatureKind::Continuous, &[2.0, 6.0, 10.0, 14.0]),
            ReferenceColumn::observed("anxiousness", FeatureKind::Categorical, &[0.0, 1.0, 1.0, 0.0]),
        ]);
        let space = FeatureSpace::from_reference(&table).unwrap();
        LocalExplainer::new(Arc::new(space), config).unwrap()
    }

    fn model(batch: &[Instance]) -> std::result::Result<Vec<Vec<f64>>, ClassifierError> {
        Ok(batch
            .iter()
            .map(|x| {
                let z = 0.3 * (x.values()[0] - 8.0) + 1.5 * x.values()[1];
                let p = 1.0 / (1.0 + (-z).exp());
                vec![1.0 - p, p]
            })
            .collect())
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let table = ReferenceTable::new(vec![ReferenceColumn::observed(
            "a",
            FeatureKind::Continuous,
            &[1.0, 2.0],
        )]);
        let space = Arc::new(FeatureSpace::from_reference(&table).unwrap());
        let config = ExplainerConfig {
            feature_budget: 0,
            ..Default::default()
        };
        assert!(matches!(
            LocalExplainer::new(space, config),
            Err(ExplainError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_explains_both_feature_kinds() {
        let explainer = explainer(ExplainerConfig {
            num_samples: 1500,
            ..Default::default()
        });
        let target = Instance::new(vec![9.0, 1.0]);
        let explanation = explainer
            .explain(&target, &model, ExplainRequest::default())
            .unwrap();
        assert_eq!(explanation.label, 1);
        assert_eq!(explanation.contributions.len(), 2);
        for c in &explanation.contributions {
            assert_eq!(c.direction, crate::explanation::Direction::Increases, "{c:?}");
        }
        assert!(explanation.fidelity > 0.5);
    }

    #[test]
    fn test_request_overrides() {
        let explainer = explainer(ExplainerConfig::default());
        let target = Instance::new(vec![9.0, 1.0]);
        let run = explainer
            .run(
                &target,
                &model,
                ExplainRequest::default().with_samples(40).with_seed(3).with_label(0),
            )
            .unwrap();
        assert_eq!(run.neighborhood.len(), 40);
        assert_eq!(run.surrogate.label, 0);
        assert_eq!(run.explanation.label, 0);
    }

    #[test]
    fn test_zero_samples_request() {
        let explainer = explainer(ExplainerConfig::default());
        let target = Instance::new(vec![9.0, 1.0]);
        let err = explainer
            .explain(&target, &model, ExplainRequest::default().with_samples(0))
            .unwrap_err();
        assert_eq!(err, ExplainError::InsufficientSampleSize { requested: 0 });
    }
}
