//! Error types for the explanation engine.
//!
//! Every failure of an explanation request surfaces as one of these variants;
//! there is no partially built explanation on the error path.

use thiserror::Error;

/// Errors produced while building the feature space or explaining an instance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplainError {
    /// The reference dataset is empty, ragged, or has a column with no observed values.
    #[error("Invalid reference data: {0}")]
    InvalidReferenceData(String),

    /// A neighbourhood of zero samples was requested.
    #[error("Insufficient sample size: requested {requested}, need at least 1")]
    InsufficientSampleSize { requested: usize },

    /// The black-box classifier failed, timed out, or returned a malformed batch.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// The sparse regression did not converge or produced non-finite coefficients.
    #[error("Surrogate fit failed: {0}")]
    SurrogateFitFailure(String),

    /// An input value lies outside the training-time value set.
    #[error("Unknown category for '{feature}': {value}")]
    UnknownCategory { feature: String, value: String },

    /// The engine configuration or request is not usable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ExplainError {
    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Self::InvalidReferenceData(msg.into())
    }

    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::ClassifierUnavailable(msg.into())
    }

    pub fn fit_failure(msg: impl Into<String>) -> Self {
        Self::SurrogateFitFailure(msg.into())
    }

    pub fn unknown_category(feature: impl Into<String>, value: impl Into<String>) -> Self {
        Self::UnknownCategory {
            feature: feature.into(),
            value: value.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether retrying the whole request (fresh neighbourhood, or a larger
    /// sample count / budget) can succeed without changing the input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ClassifierUnavailable(_) | Self::SurrogateFitFailure(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ExplainError>;
