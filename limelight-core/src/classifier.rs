//! Black-box classifier capability.
//!
//! Any model family can take part in an explanation as long as it scores a
//! batch of instances into per-class probability distributions.

use crate::error::ExplainError;
use crate::types::Instance;

/// Tolerance on `sum(probabilities) == 1` for each scored row.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-3;

/// Failure reported by a classifier implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ClassifierError {
    pub message: String,
}

impl ClassifierError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A probabilistic classifier consulted as a black box.
pub trait Classifier: Send + Sync {
    /// Score every instance of the batch; one distribution per instance, in order.
    fn predict_proba(&self, batch: &[Instance]) -> Result<Vec<Vec<f64>>, ClassifierError>;
}

impl<F> Classifier for F
where
    F: Fn(&[Instance]) -> Result<Vec<Vec<f64>>, ClassifierError> + Send + Sync,
{
    fn predict_proba(&self, batch: &[Instance]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        self(batch)
    }
}

/// Score a batch and check the response shape. Returns the class count.
pub(crate) fn score_batch(
    classifier: &dyn Classifier,
    batch: &[Instance],
) -> Result<(Vec<Vec<f64>>, usize), ExplainError> {
    let rows = classifier
        .predict_proba(batch)
        .map_err(|e| ExplainError::classifier(e.message))?;

    if rows.len() != batch.len() {
        return Err(ExplainError::classifier(format!(
            "classifier returned {} distributions for {} instances",
            rows.len(),
            batch.len()
        )));
    }
    let classes = rows.first().map_or(0, Vec::len);
    if classes == 0 {
        return Err(ExplainError::classifier("classifier returned no classes"));
    }
    for (i, row) in rows.iter().enumerate() {
        if row.len() != classes {
            return Err(ExplainError::classifier(format!(
                "row {i} has {} classes, expected {classes}",
                row.len()
            )));
        }
        if row.iter().any(|p| !p.is_finite()) {
            return Err(ExplainError::classifier(format!(
                "row {i} contains a non-finite probability"
            )));
        }
        let sum: f64 = row.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(ExplainError::classifier(format!(
                "row {i} probabilities sum to {sum}"
            )));
        }
    }
    Ok((rows, classes))
}

/// Index of the most probable class; the first index wins ties.
pub fn argmax(probabilities: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        match best {
            Some((_, bp)) if p <= bp => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(batch: &[Instance]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        Ok(vec![vec![0.3, 0.7]; batch.len()])
    }

    #[test]
    fn test_closure_classifier() {
        let batch = vec![Instance::new(vec![0.0]); 3];
        let (rows, classes) = score_batch(&constant, &batch).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(classes, 2);
    }

    #[test]
    fn test_failure_maps_to_unavailable() {
        let failing = |_: &[Instance]| -> Result<Vec<Vec<f64>>, ClassifierError> {
            Err(ClassifierError::new("model server down"))
        };
        let err = score_batch(&failing, &[Instance::new(vec![1.0])]).unwrap_err();
        assert_eq!(err, ExplainError::ClassifierUnavailable("model server down".into()));
    }

    #[test]
    fn test_malformed_batches_rejected() {
        let short = |_: &[Instance]| -> Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(vec![vec![1.0]])
        };
        let batch = vec![Instance::new(vec![1.0]); 2];
        assert!(score_batch(&short, &batch).is_err());

        let unnormalised = |b: &[Instance]| -> Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(vec![vec![0.5, 0.6]; b.len()])
        };
        assert!(score_batch(&unnormalised, &batch).is_err());

        let nan = |b: &[Instance]| -> Result<Vec<Vec<f64>>, ClassifierError> {
            Ok(vec![vec![f64::NAN, 1.0]; b.len()])
        };
        assert!(score_batch(&nan, &batch).is_err());
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[]), None);
    }
}
