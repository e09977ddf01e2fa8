//! Explanation assembly: ranks surrogate coefficients into a human-orderable
//! list of feature contributions.

use crate::descriptor::FeatureSpace;
use crate::types::{FeatureKind, Instance, SurrogateModel};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Direction in which a feature moves the explained class probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increases,
    Decreases,
}

impl Direction {
    pub fn from_coefficient(coefficient: f64) -> Self {
        if coefficient >= 0.0 {
            Self::Increases
        } else {
            Self::Decreases
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Increases => "increases predicted likelihood",
            Self::Decreases => "decreases predicted likelihood",
        }
    }

    pub fn sign(&self) -> char {
        match self {
            Self::Increases => '+',
            Self::Decreases => '-',
        }
    }
}

/// One ranked feature contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub feature_index: usize,
    pub kind: FeatureKind,
    /// The target's (encoded) value for this feature.
    pub value: f64,
    pub coefficient: f64,
    pub direction: Direction,
    pub description: String,
}

/// The externally consumable result of one explanation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Explained class index.
    pub label: usize,
    /// Contributions by strictly non-increasing `|coefficient|`.
    pub contributions: Vec<Contribution>,
    pub intercept: f64,
    /// Weighted R² of the surrogate on the neighbourhood, in `[0, 1]`.
    pub fidelity: f64,
    pub target_probability: f64,
    pub local_prediction: f64,
    /// Fidelity threshold in force when the explanation was produced.
    pub min_fidelity: f64,
}

impl Explanation {
    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    /// Whether callers should treat this explanation as untrustworthy.
    pub fn is_low_fidelity(&self) -> bool {
        self.fidelity < self.min_fidelity
    }

    pub fn top(&self, n: usize) -> &[Contribution] {
        &self.contributions[..n.min(self.contributions.len())]
    }
}

/// Turns a `SurrogateModel` into an `Explanation`.
#[derive(Debug, Clone, Copy)]
pub struct ExplanationAssembler {
    top_k: usize,
    min_fidelity: f64,
}

impl ExplanationAssembler {
    pub fn new(top_k: usize, min_fidelity: f64) -> Self {
        Self {
            top_k,
            min_fidelity,
        }
    }

    pub fn assemble(
        &self,
        model: &SurrogateModel,
        space: &FeatureSpace,
        target: &Instance,
    ) -> Explanation {
        let mut terms = model.terms.clone();
        terms.sort_by(|a, b| {
            b.coefficient
                .abs()
                .partial_cmp(&a.coefficient.abs())
                .unwrap_or(Ordering::Equal)
                .then(a.feature.cmp(&b.feature))
        });
        terms.truncate(self.top_k);

        let contributions = terms
            .into_iter()
            .filter_map(|term| {
                let spec = space.describe(term.feature)?;
                let direction = Direction::from_coefficient(term.coefficient);
                let value = target.get(term.feature).unwrap_or(f64::NAN);
                Some(Contribution {
                    description: format!("{} = {} {}", spec.name, value, direction.label()),
                    feature: spec.name.clone(),
                    feature_index: term.feature,
                    kind: spec.kind(),
                    value,
                    coefficient: term.coefficient,
                    direction,
                })
            })
            .collect();

        Explanation {
            label: model.label,
            contributions,
            intercept: model.intercept,
            fidelity: model.fidelity,
            target_probability: model.target_probability,
            local_prediction: model.local_prediction,
            min_fidelity: self.min_fidelity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ReferenceColumn, ReferenceTable};
    use crate::types::SurrogateTerm;
    use pretty_assertions::assert_eq;

    fn space() -> FeatureSpace {
        let table = ReferenceTable::new(vec![
            ReferenceColumn::observed("age", FeatureKind::Continuous, &[20.0, 40.0]),
            ReferenceColumn::observed("suicidal", FeatureKind::Categorical, &[0.0, 1.0]),
            ReferenceColumn::observed("phq_score", FeatureKind::Continuous, &[3.0, 15.0]),
        ]);
        FeatureSpace::from_reference(&table).unwrap()
    }

    fn model(terms: Vec<(usize, f64)>) -> SurrogateModel {
        SurrogateModel {
            label: 2,
            terms: terms
                .into_iter()
                .map(|(feature, coefficient)| SurrogateTerm {
                    feature,
                    coefficient,
                })
                .collect(),
            intercept: 0.3,
            fidelity: 0.8,
            target_probability: 0.62,
            local_prediction: 0.6,
            lambda: 0.001,
        }
    }

    #[test]
    fn test_sorted_by_absolute_coefficient() {
        let target = Instance::new(vec![25.0, 1.0, 12.0]);
        let explanation = ExplanationAssembler::new(10, 0.5).assemble(
            &model(vec![(0, 0.05), (1, -0.3), (2, 0.2)]),
            &space(),
            &target,
        );
        let order: Vec<&str> = explanation
            .contributions
            .iter()
            .map(|c| c.feature.as_str())
            .collect();
        assert_eq!(order, vec!["suicidal", "phq_score", "age"]);
        assert_eq!(explanation.contributions[0].direction, Direction::Decreases);
        assert_eq!(
            explanation.contributions[1].description,
            "phq_score = 12 increases predicted likelihood"
        );
        assert_eq!(explanation.label, 2);
        assert!(!explanation.is_low_fidelity());
    }

    #[test]
    fn test_ties_ordered_by_feature_index() {
        let target = Instance::new(vec![25.0, 1.0, 12.0]);
        let explanation = ExplanationAssembler::new(10, 0.5).assemble(
            &model(vec![(2, 0.1), (0, -0.1)]),
            &space(),
            &target,
        );
        assert_eq!(explanation.contributions[0].feature_index, 0);
        assert_eq!(explanation.contributions[1].feature_index, 2);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let target = Instance::new(vec![25.0, 1.0, 12.0]);
        let explanation = ExplanationAssembler::new(1, 0.5).assemble(
            &model(vec![(0, 0.05), (1, -0.3), (2, 0.2)]),
            &space(),
            &target,
        );
        assert_eq!(explanation.contributions.len(), 1);
        assert_eq!(explanation.top(5).len(), 1);
    }

    #[test]
    fn test_empty_model_gives_empty_explanation() {
        let target = Instance::new(vec![25.0, 1.0, 12.0]);
        let explanation =
            ExplanationAssembler::new(10, 0.9).assemble(&model(vec![]), &space(), &target);
        assert!(explanation.is_empty());
        assert!(explanation.is_low_fidelity());
    }
}
