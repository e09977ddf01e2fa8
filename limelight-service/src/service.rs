//! Prediction orchestration: encode → classify → explain → rationale → report.
//!
//! The service holds only immutable, shared handles, so one instance serves
//! any number of concurrent requests. Classifier work runs on the blocking
//! pool under the configured timeout; an elapsed timeout is reported as
//! `ClassifierUnavailable` and nothing from the request is kept.

use crate::config::AppConfig;
use crate::encoding::{AttributeSchema, RawRecord};
use crate::error::{ArtifactError, RationaleError, Result};
use crate::model::SoftmaxClassifier;
use crate::rationale::{GeminiClient, TextGenerator, coping_prompt, rationale_prompt};
use crate::reference::load_reference;
use crate::report::Report;
use limelight_core::{
    Classifier, ExplainError, ExplainRequest, Explanation, FeatureSpace, Instance, LabelChoice,
    LocalExplainer, argmax,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One prediction request.
#[derive(Debug, Clone, Default)]
pub struct PredictionRequest {
    pub record: RawRecord,
    /// Seed and sample-count overrides for the explanation.
    pub explain: ExplainRequest,
    /// Explain this class (by name) instead of the predicted one.
    pub label: Option<String>,
    /// Ask the text generator for a rationale and coping suggestions.
    pub rationale: bool,
}

impl PredictionRequest {
    pub fn new(record: RawRecord) -> Self {
        Self {
            record,
            ..Default::default()
        }
    }
}

pub struct PredictionService {
    schema: Arc<AttributeSchema>,
    classifier: Arc<dyn Classifier>,
    explainer: Arc<LocalExplainer>,
    generator: Option<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl std::fmt::Debug for PredictionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictionService")
            .field("attributes", &self.schema.len())
            .field("classes", &self.schema.target_classes)
            .field("has_generator", &self.generator.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PredictionService {
    pub fn new(
        schema: Arc<AttributeSchema>,
        classifier: Arc<dyn Classifier>,
        explainer: Arc<LocalExplainer>,
        timeout: Duration,
    ) -> Result<Self> {
        if explainer.space().len() != schema.len() {
            return Err(ArtifactError::schema(format!(
                "schema has {} attributes but the feature space has {}",
                schema.len(),
                explainer.space().len()
            ))
            .into());
        }
        Ok(Self {
            schema,
            classifier,
            explainer,
            generator: None,
            timeout,
        })
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Load schema, reference data and model named by `config`, relative to `workspace`.
    pub fn from_config(config: &AppConfig, workspace: &Path) -> Result<Self> {
        let artifacts = config.artifacts.resolved(workspace);
        let schema = AttributeSchema::from_file(&artifacts.schema)?;
        let table = load_reference(&artifacts.reference, &schema)?;
        let space = FeatureSpace::from_reference(&table)?;

        let model = SoftmaxClassifier::from_file(&artifacts.model)?;
        if model.num_features() != schema.len() {
            return Err(ArtifactError::model(format!(
                "model expects {} features, schema declares {}",
                model.num_features(),
                schema.len()
            ))
            .into());
        }
        if model.num_classes() != schema.num_classes() {
            return Err(ArtifactError::model(format!(
                "model has {} classes, schema declares {}",
                model.num_classes(),
                schema.num_classes()
            ))
            .into());
        }

        let explainer = LocalExplainer::new(Arc::new(space), config.explainer.clone())?;
        let mut service = Self::new(
            Arc::new(schema),
            Arc::new(model),
            Arc::new(explainer),
            Duration::from_secs(config.classifier.timeout_secs),
        )?;

        if config.rationale.enabled {
            match GeminiClient::new(&config.rationale) {
                Ok(client) => service = service.with_generator(Arc::new(client)),
                Err(e) => warn!(error = %e, "Rationale disabled"),
            }
        }
        Ok(service)
    }

    pub fn schema(&self) -> &AttributeSchema {
        &self.schema
    }

    pub fn explainer(&self) -> &LocalExplainer {
        &self.explainer
    }

    pub fn has_generator(&self) -> bool {
        self.generator.is_some()
    }

    pub async fn predict(&self, request: PredictionRequest) -> Result<Report> {
        let instance = self.schema.encode(&request.record)?;

        let probabilities = self.classify(instance.clone()).await?;
        if probabilities.len() != self.schema.num_classes() {
            return Err(ExplainError::classifier(format!(
                "classifier returned {} classes, schema declares {}",
                probabilities.len(),
                self.schema.num_classes()
            ))
            .into());
        }
        let predicted = argmax(&probabilities)
            .ok_or_else(|| ExplainError::classifier("classifier returned no classes"))?;
        let predicted_label = self.schema.decode(predicted)?.to_string();

        let mut explain = request.explain;
        if let Some(name) = &request.label {
            explain.label = LabelChoice::Class(self.schema.class_index(name)?);
        }
        let explanation = self.explain(instance, explain).await?;

        let attributes: Vec<(String, String)> = self
            .schema
            .attributes
            .iter()
            .map(|a| {
                let value = request
                    .record
                    .get(&a.name)
                    .map(ToString::to_string)
                    .unwrap_or_default();
                (a.name.clone(), value)
            })
            .collect();

        let (rationale, coping) = if request.rationale {
            self.rationale(&predicted_label, &attributes).await
        } else {
            (None, None)
        };

        info!(
            predicted = predicted_label.as_str(),
            probability = probabilities[predicted],
            fidelity = explanation.fidelity,
            rationale = rationale.is_some(),
            "Prediction complete"
        );

        let schema = Arc::clone(&self.schema);
        Ok(Report::new(
            &self.schema.target_classes,
            &probabilities,
            predicted,
            explanation,
            attributes,
            move |feature, value| schema.display_value(feature, value),
        )
        .with_rationale(rationale, coping))
    }

    async fn classify(&self, instance: Instance) -> Result<Vec<f64>> {
        let classifier = Arc::clone(&self.classifier);
        let mut rows = self
            .bounded(move || {
                classifier
                    .predict_proba(std::slice::from_ref(&instance))
                    .map_err(|e| ExplainError::classifier(e.message))
            })
            .await?;
        rows.pop()
            .filter(|_| rows.is_empty())
            .ok_or_else(|| ExplainError::classifier("expected one distribution for the input").into())
    }

    async fn explain(&self, target: Instance, request: ExplainRequest) -> Result<Explanation> {
        let explainer = Arc::clone(&self.explainer);
        let classifier = Arc::clone(&self.classifier);
        self.bounded(move || explainer.explain(&target, classifier.as_ref(), request))
            .await
    }

    /// Run classifier-bound work on the blocking pool under the timeout.
    async fn bounded<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> std::result::Result<T, ExplainError> + Send + 'static,
    {
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(work)).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(join)) => Err(ExplainError::classifier(format!("classifier task failed: {join}")).into()),
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Classifier call timed out");
                Err(ExplainError::classifier(format!(
                    "classifier did not answer within {:?}",
                    self.timeout
                ))
                .into())
            }
        }
    }

    /// Rationale and coping text; failures are logged and yield `None`.
    async fn rationale(
        &self,
        predicted_label: &str,
        attributes: &[(String, String)],
    ) -> (Option<String>, Option<String>) {
        let Some(generator) = &self.generator else {
            warn!("Rationale requested but no text generator is configured");
            return (None, None);
        };
        let rationale = generator
            .generate_text(&rationale_prompt(predicted_label, attributes))
            .await;
        let coping = generator.generate_text(&coping_prompt(predicted_label)).await;
        (ok_or_log(rationale, "rationale"), ok_or_log(coping, "coping"))
    }
}

fn ok_or_log(result: std::result::Result<String, RationaleError>, what: &str) -> Option<String> {
    match result {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, kind = what, "Text generation failed; continuing without it");
            None
        }
    }
}
