//! Error types for the service layer.
//!
//! `ServiceError` wraps the engine's `ExplainError` together with artifact,
//! rationale, report and configuration failures.

use limelight_core::ExplainError;
use std::path::PathBuf;

/// Top-level error type for the limelight service library.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Explanation error: {0}")]
    Explain(#[from] ExplainError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("Rationale error: {0}")]
    Rationale(#[from] RationaleError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

/// Errors from loading schema, reference data and model artifacts.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid CSV in {path}: {message}")]
    Csv { path: PathBuf, message: String },

    #[error("Invalid schema: {message}")]
    Schema { message: String },

    #[error("Invalid model: {message}")]
    Model { message: String },
}

impl ArtifactError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Csv {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            message: message.into(),
        }
    }
}

/// Errors from the natural-language rationale service.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RationaleError {
    #[error("No API key configured (set {env_var} or rationale.api_key)")]
    MissingApiKey { env_var: String },

    #[error("Authentication rejected by {provider}")]
    AuthFailed { provider: String },

    #[error("Rationale request failed: {message}")]
    Request { message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Rationale response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Rationale request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Errors from rendering a report.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ServiceError>;
