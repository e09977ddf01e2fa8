//! End-to-end tests of the explanation pipeline against synthetic classifiers.

use limelight_core::{
    ClassifierError, Direction, ExplainError, ExplainRequest, ExplainerConfig, FeatureKind,
    FeatureSpace, Instance, LabelChoice, LocalExplainer, ReferenceColumn, ReferenceTable,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

type Scores = Result<Vec<Vec<f64>>, ClassifierError>;

/// `features` continuous columns of 100 rows, each with mean 0 and std 1.
fn standard_space(features: usize) -> Arc<FeatureSpace> {
    let values: Vec<f64> = (0..100)
        .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
        .collect();
    let columns = (0..features)
        .map(|j| ReferenceColumn::observed(format!("x{}", j + 1), FeatureKind::Continuous, &values))
        .collect();
    Arc::new(FeatureSpace::from_reference(&ReferenceTable::new(columns)).unwrap())
}

fn explainer(space: Arc<FeatureSpace>, config: ExplainerConfig) -> LocalExplainer {
    LocalExplainer::new(space, config).unwrap()
}

fn constant_07(batch: &[Instance]) -> Scores {
    Ok(vec![vec![0.3, 0.7]; batch.len()])
}

fn linear(batch: &[Instance]) -> Scores {
    Ok(batch
        .iter()
        .map(|x| {
            let v = x.values();
            let p = 0.5 + 0.1 * v[0] - 0.2 * v[1];
            vec![1.0 - p, p]
        })
        .collect())
}

fn curved(batch: &[Instance]) -> Scores {
    Ok(batch
        .iter()
        .map(|x| {
            let v = x.values();
            let z = 1.5 * v[0] - v[1] + 0.8 * v[2] * v[2];
            let p = 1.0 / (1.0 + (-z).exp());
            vec![1.0 - p, p]
        })
        .collect())
}

#[test]
fn test_constant_classifier_is_fit_by_intercept_alone() {
    let explainer = explainer(standard_space(3), ExplainerConfig::default());
    let run = explainer
        .run(
            &Instance::new(vec![0.0, 0.0, 0.0]),
            &constant_07,
            ExplainRequest::default(),
        )
        .unwrap();

    assert_eq!(run.surrogate.label, 1);
    assert!(run.surrogate.is_empty(), "{:?}", run.surrogate.terms);
    assert!((run.surrogate.intercept - 0.7).abs() < 1e-9);
    assert!((run.explanation.fidelity - 1.0).abs() < 1e-9);
    assert!(run.explanation.is_empty());
    assert!(!run.explanation.is_low_fidelity());
}

#[test]
fn test_linear_classifier_coefficients_recovered() {
    let explainer = explainer(
        standard_space(3),
        ExplainerConfig {
            num_samples: 2000,
            feature_budget: 5,
            ..Default::default()
        },
    );
    let run = explainer
        .run(
            &Instance::new(vec![0.0, 0.0, 0.0]),
            &linear,
            ExplainRequest::default().with_label(1),
        )
        .unwrap();

    let surrogate = &run.surrogate;
    let b1 = surrogate.coefficient(0).unwrap_or(0.0);
    let b2 = surrogate.coefficient(1).unwrap_or(0.0);
    let b3 = surrogate.coefficient(2).unwrap_or(0.0);
    assert!((b1 - 0.1).abs() < 0.03, "x1 coefficient {b1}");
    assert!((b2 + 0.2).abs() < 0.03, "x2 coefficient {b2}");
    assert!(b3.abs() < 0.03, "x3 coefficient {b3}");
    assert!(surrogate.fidelity > 0.9);
    assert!((surrogate.intercept - 0.5).abs() < 0.03);

    let explanation = &run.explanation;
    assert_eq!(explanation.contributions[0].feature, "x2");
    assert_eq!(explanation.contributions[0].direction, Direction::Decreases);
    assert_eq!(explanation.contributions[1].feature, "x1");
    assert_eq!(explanation.contributions[1].direction, Direction::Increases);
}

#[test]
fn test_repeated_requests_are_bit_identical() {
    let explainer = explainer(
        standard_space(3),
        ExplainerConfig {
            num_samples: 500,
            ..Default::default()
        },
    );
    let target = Instance::new(vec![0.3, -0.2, 1.1]);
    let first = explainer
        .run(&target, &curved, ExplainRequest::default().with_seed(7))
        .unwrap();
    let second = explainer
        .run(&target, &curved, ExplainRequest::default().with_seed(7))
        .unwrap();
    assert_eq!(first.neighborhood, second.neighborhood);
    assert_eq!(first.surrogate, second.surrogate);
    assert_eq!(first.explanation, second.explanation);

    let other = explainer
        .run(&target, &curved, ExplainRequest::default().with_seed(8))
        .unwrap();
    assert!(other.neighborhood != first.neighborhood);
}

#[test]
fn test_target_has_unit_weight_and_zero_distance() {
    let explainer = explainer(standard_space(4), ExplainerConfig::default());
    let target = Instance::new(vec![0.5, -1.0, 2.0, 0.0]);
    let hood = explainer.neighborhood(&target, 300, 11).unwrap();
    let first = hood.target().unwrap();
    assert_eq!(first.instance, target);
    assert_eq!(first.distance, 0.0);
    assert_eq!(first.weight, 1.0);
    assert!(hood.samples()[1..].iter().all(|s| s.weight <= 1.0 && s.weight > 0.0));
}

#[test]
fn test_zero_samples_fail_without_neighbourhood() {
    let explainer = explainer(standard_space(3), ExplainerConfig::default());
    let target = Instance::new(vec![0.0; 3]);
    assert_eq!(
        explainer.neighborhood(&target, 0, 1).unwrap_err(),
        ExplainError::InsufficientSampleSize { requested: 0 }
    );
    assert_eq!(
        explainer
            .explain(&target, &linear, ExplainRequest::default().with_samples(0))
            .unwrap_err(),
        ExplainError::InsufficientSampleSize { requested: 0 }
    );
}

#[test]
fn test_failing_classifier_yields_no_explanation() {
    let explainer = explainer(standard_space(3), ExplainerConfig::default());
    let failing = |_: &[Instance]| -> Scores { Err(ClassifierError::new("connection refused")) };
    let err = explainer
        .explain(&Instance::new(vec![0.0; 3]), &failing, ExplainRequest::default())
        .unwrap_err();
    assert!(matches!(err, ExplainError::ClassifierUnavailable(ref m) if m.contains("refused")));
    assert!(err.is_retryable());
}

#[test]
fn test_zero_variance_reference_gives_unit_weights() {
    let table = ReferenceTable::new(vec![
        ReferenceColumn::observed("age", FeatureKind::Continuous, &[30.0; 10]),
        ReferenceColumn::observed("smoker", FeatureKind::Categorical, &[1.0; 10]),
    ]);
    let space = Arc::new(FeatureSpace::from_reference(&table).unwrap());
    let explainer = explainer(space, ExplainerConfig::default());
    let target = Instance::new(vec![30.0, 1.0]);

    let run = explainer
        .run(&target, &constant_07, ExplainRequest::default().with_samples(50))
        .unwrap();
    assert!(run.neighborhood.samples().iter().all(|s| s.weight == 1.0));
    assert!(run.explanation.is_empty());
    assert!(run.explanation.fidelity.is_finite());
}

#[test]
fn test_fidelity_does_not_drop_with_more_samples() {
    let explainer = explainer(standard_space(3), ExplainerConfig::default());
    let target = Instance::new(vec![0.2, -0.4, 0.6]);
    let trials = 20;

    let mean_fidelity = |samples: usize| -> f64 {
        (0..trials)
            .map(|seed| {
                explainer
                    .explain(
                        &target,
                        &curved,
                        ExplainRequest::default()
                            .with_samples(samples)
                            .with_seed(seed as u64),
                    )
                    .unwrap()
                    .fidelity
            })
            .sum::<f64>()
            / trials as f64
    };

    let small = mean_fidelity(200);
    let large = mean_fidelity(2000);
    assert!(large >= small - 0.05, "small={small} large={large}");
}

#[test]
fn test_explicit_label_overrides_prediction() {
    let explainer = explainer(standard_space(3), ExplainerConfig::default());
    let target = Instance::new(vec![0.0; 3]);
    let explanation = explainer
        .explain(
            &target,
            &constant_07,
            ExplainRequest {
                label: LabelChoice::Class(0),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(explanation.label, 0);
    assert!((explanation.target_probability - 0.3).abs() < 1e-12);
}

#[test]
fn test_wrong_dimension_target_rejected() {
    let explainer = explainer(standard_space(3), ExplainerConfig::default());
    let err = explainer
        .explain(&Instance::new(vec![0.0; 2]), &linear, ExplainRequest::default())
        .unwrap_err();
    assert!(matches!(err, ExplainError::InvalidConfig(_)));
}

#[test]
fn test_explainer_is_shareable_across_threads() {
    let explainer = Arc::new(explainer(
        standard_space(3),
        ExplainerConfig {
            num_samples: 300,
            ..Default::default()
        },
    ));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let explainer = Arc::clone(&explainer);
            std::thread::spawn(move || {
                explainer
                    .explain(&Instance::new(vec![0.1, 0.2, 0.3]), &curved, ExplainRequest::default())
                    .unwrap()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|w| w[0] == w[1]));
}
