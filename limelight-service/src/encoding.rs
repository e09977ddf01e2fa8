//! Attribute schema and the encoder pair around the engine.
//!
//! Raw attribute records (numbers, yes/no flags and named categories) are
//! encoded into the numeric `Instance` the classifier and explainer work on,
//! and predicted class indices are decoded back into class names. Category
//! codes follow the sorted position of each class, as a label encoder fitted
//! on the training data assigns them.

use crate::error::ArtifactError;
use limelight_core::{ExplainError, FeatureKind, Instance};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// How one raw attribute maps onto a numeric feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttributeKind {
    /// Passed through unchanged.
    Numeric,
    /// `false`/`true` as 0/1.
    Flag,
    /// One of a fixed class list, coded by sorted position.
    Category { classes: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: AttributeKind,
}

impl AttributeSpec {
    pub fn feature_kind(&self) -> FeatureKind {
        match self.kind {
            AttributeKind::Numeric => FeatureKind::Continuous,
            AttributeKind::Flag | AttributeKind::Category { .. } => FeatureKind::Categorical,
        }
    }
}

/// One raw attribute value as supplied by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A raw attribute record keyed by attribute name.
pub type RawRecord = BTreeMap<String, AttributeValue>;

/// Declared attribute domain plus the target class names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub attributes: Vec<AttributeSpec>,
    pub target_classes: Vec<String>,
}

impl AttributeSchema {
    /// Build a schema, sorting class lists into their encoded order.
    pub fn new(
        attributes: Vec<AttributeSpec>,
        target_classes: Vec<String>,
    ) -> Result<Self, ArtifactError> {
        let mut schema = Self {
            attributes,
            target_classes,
        };
        schema.normalize()?;
        Ok(schema)
    }

    pub fn from_file(path: &Path) -> Result<Self, ArtifactError> {
        let text = std::fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
        let schema: Self =
            serde_json::from_str(&text).map_err(|e| ArtifactError::json(path, e))?;
        Self::new(schema.attributes, schema.target_classes)
    }

    fn normalize(&mut self) -> Result<(), ArtifactError> {
        if self.attributes.is_empty() {
            return Err(ArtifactError::schema("schema declares no attributes"));
        }
        let mut seen = HashSet::new();
        for attr in &mut self.attributes {
            if !seen.insert(attr.name.clone()) {
                return Err(ArtifactError::schema(format!(
                    "duplicate attribute '{}'",
                    attr.name
                )));
            }
            if let AttributeKind::Category { classes } = &mut attr.kind {
                sort_classes(classes, &attr.name)?;
            }
        }
        sort_classes(&mut self.target_classes, "target")
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.target_classes.len()
    }

    /// Feature kinds in instance order, for building the feature space.
    pub fn feature_kinds(&self) -> Vec<(String, FeatureKind)> {
        self.attributes
            .iter()
            .map(|a| (a.name.clone(), a.feature_kind()))
            .collect()
    }

    /// Encode a raw record into an instance.
    pub fn encode(&self, record: &RawRecord) -> Result<Instance, ExplainError> {
        self.attributes
            .iter()
            .map(|attr| {
                let value = record
                    .get(&attr.name)
                    .ok_or_else(|| ExplainError::unknown_category(&attr.name, "<missing>"))?;
                encode_value(attr, value)
            })
            .collect::<Result<Vec<f64>, _>>()
            .map(Instance::new)
    }

    /// Name of a predicted class index.
    pub fn decode(&self, class: usize) -> Result<&str, ExplainError> {
        self.target_classes
            .get(class)
            .map(String::as_str)
            .ok_or_else(|| ExplainError::unknown_category("target", class.to_string()))
    }

    /// Class index of a target class name.
    pub fn class_index(&self, name: &str) -> Result<usize, ExplainError> {
        self.target_classes
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ExplainError::unknown_category("target", name))
    }

    /// Human-readable form of an encoded feature value.
    pub fn display_value(&self, feature: usize, value: f64) -> String {
        match self.attributes.get(feature).map(|a| &a.kind) {
            Some(AttributeKind::Flag) => (if value != 0.0 { "yes" } else { "no" }).to_string(),
            Some(AttributeKind::Category { classes }) => {
                let code = value.round();
                if code >= 0.0 && (code as usize) < classes.len() {
                    classes[code as usize].clone()
                } else {
                    format!("{value}")
                }
            }
            _ => format!("{value}"),
        }
    }
}

fn sort_classes(classes: &mut [String], owner: &str) -> Result<(), ArtifactError> {
    if classes.is_empty() {
        return Err(ArtifactError::schema(format!("'{owner}' declares no classes")));
    }
    classes.sort();
    if classes.windows(2).any(|w| w[0] == w[1]) {
        return Err(ArtifactError::schema(format!(
            "'{owner}' declares a class twice"
        )));
    }
    Ok(())
}

fn encode_value(attr: &AttributeSpec, value: &AttributeValue) -> Result<f64, ExplainError> {
    let reject = || ExplainError::unknown_category(&attr.name, value.to_string());
    match (&attr.kind, value) {
        (AttributeKind::Numeric, AttributeValue::Number(n)) if n.is_finite() => Ok(*n),
        (AttributeKind::Flag, AttributeValue::Flag(b)) => Ok(if *b { 1.0 } else { 0.0 }),
        (AttributeKind::Flag, AttributeValue::Number(n)) if *n == 0.0 || *n == 1.0 => Ok(*n),
        (AttributeKind::Category { classes }, AttributeValue::Text(s)) => classes
            .binary_search(s)
            .map(|i| i as f64)
            .map_err(|_| reject()),
        _ => Err(reject()),
    }
}
