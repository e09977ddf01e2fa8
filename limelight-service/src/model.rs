//! Serialisable multinomial linear classifier.

use crate::error::ArtifactError;
use limelight_core::{Classifier, ClassifierError, Instance};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Multinomial logistic ("softmax") model: `softmax(W·x + b)`.
///
/// Stored as JSON with `weights[class][feature]` and `bias[class]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxClassifier {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

impl SoftmaxClassifier {
    pub fn new(weights: Vec<Vec<f64>>, bias: Vec<f64>) -> Result<Self, ArtifactError> {
        let model = Self { weights, bias };
        model.validate()?;
        Ok(model)
    }

    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
        let model: Self = serde_json::from_str(&text).map_err(|e| ArtifactError::json(path, e))?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.weights.is_empty() {
            return Err(ArtifactError::model("model has no classes"));
        }
        if self.bias.len() != self.weights.len() {
            return Err(ArtifactError::model(format!(
                "{} weight rows but {} bias terms",
                self.weights.len(),
                self.bias.len()
            )));
        }
        let d = self.weights[0].len();
        if self.weights.iter().any(|row| row.len() != d) {
            return Err(ArtifactError::model("weight rows differ in length"));
        }
        if self
            .weights
            .iter()
            .flatten()
            .chain(&self.bias)
            .any(|v| !v.is_finite())
        {
            return Err(ArtifactError::model("model contains non-finite parameters"));
        }
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.weights.len()
    }

    pub fn num_features(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    /// Class probabilities for a single instance.
    pub fn probabilities(&self, instance: &Instance) -> Result<Vec<f64>, ClassifierError> {
        if instance.len() != self.num_features() {
            return Err(ClassifierError::new(format!(
                "instance has {} features, model expects {}",
                instance.len(),
                self.num_features()
            )));
        }
        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| b + row.iter().zip(instance.values()).map(|(w, x)| w * x).sum::<f64>())
            .collect();
        Ok(softmax(&logits))
    }
}

impl Classifier for SoftmaxClassifier {
    fn predict_proba(&self, batch: &[Instance]) -> Result<Vec<Vec<f64>>, ClassifierError> {
        batch.iter().map(|x| self.probabilities(x)).collect()
    }
}

/// Numerically stable softmax.
fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|z| (z - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
