//! # limelight-service: prediction, explanation and reporting around limelight-core
//!
//! Loads the deployment artifacts (attribute schema, reference CSV, softmax
//! model), encodes raw attribute records, runs the local explainer under a
//! classifier timeout, optionally asks a text generator for a rationale, and
//! renders the result as a report.

pub mod config;
pub mod encoding;
pub mod error;
pub mod model;
pub mod rationale;
pub mod reference;
pub mod report;
pub mod service;

// Re-exports
pub use config::{AppConfig, load_config};
pub use encoding::{AttributeKind, AttributeSchema, AttributeSpec, AttributeValue, RawRecord};
pub use error::{ArtifactError, RationaleError, ReportError, Result, ServiceError};
pub use model::SoftmaxClassifier;
pub use rationale::{GeminiClient, TextGenerator};
pub use reference::load_reference;
pub use report::{Report, ReportFormat};
pub use service::{PredictionRequest, PredictionService};
