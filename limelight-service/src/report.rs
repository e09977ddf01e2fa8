//! Prediction reports.
//!
//! A `Report` is a pure function of the prediction, its explanation and the
//! optional rationale text. It renders to HTML (handlebars), Markdown, plain
//! text or JSON; writing it anywhere is the caller's decision.

use crate::error::ReportError;
use chrono::{DateTime, Utc};
use handlebars::Handlebars;
use limelight_core::{Direction, Explanation};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Prediction report {{id}}</title>
<style>
body { font-family: sans-serif; max-width: 52rem; margin: 2rem auto; color: #222; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: 0.35rem 0.6rem; text-align: left; }
.increases { color: #1a7f37; }
.decreases { color: #cf222e; }
.warning { background: #fff8c5; padding: 0.5rem 0.8rem; }
</style>
</head>
<body>
<h1>Prediction &amp; Explanation Report</h1>
<p>Generated {{created_at}} &middot; report {{id}}</p>
<h2>Predicted condition: {{predicted_label}}</h2>
<table>
<tr><th>Class</th><th>Probability</th></tr>
{{#each probabilities}}<tr><td>{{label}}</td><td>{{percent}}</td></tr>
{{/each}}</table>
<h2>Why: local explanation for {{explained_label}}</h2>
<p>Local fidelity {{fidelity}}</p>
{{#if low_fidelity}}<p class="warning">The local surrogate fits the classifier poorly around this input; treat the ranking below with caution.</p>
{{/if}}{{#if entries}}<table>
<tr><th>Feature</th><th>Value</th><th>Weight</th><th>Effect</th></tr>
{{#each entries}}<tr class="{{direction}}"><td>{{feature}}</td><td>{{value}}</td><td>{{weight}}</td><td>{{effect}}</td></tr>
{{/each}}</table>
{{else}}<p>No feature moved the prediction in this neighbourhood.</p>
{{/if}}{{#if rationale}}<h2>Explanation</h2>
<p>{{rationale}}</p>
{{/if}}{{#if coping}}<h2>Coping Mechanisms and Next Steps</h2>
<p>{{coping}}</p>
{{/if}}<h2>Input</h2>
<table>
{{#each attributes}}<tr><td>{{name}}</td><td>{{value}}</td></tr>
{{/each}}</table>
</body>
</html>
"#;

/// Output encodings for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    Text,
    Json,
    Html,
    Markdown,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Json => "json",
            Self::Html => "html",
            Self::Markdown => "md",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: String,
    pub probability: f64,
    pub percent: String,
}

/// One explanation entry with display-ready fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub feature: String,
    pub value: String,
    pub weight: String,
    pub direction: Direction,
    pub effect: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeEntry {
    pub name: String,
    pub value: String,
}

/// Everything produced for one prediction request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub predicted_label: String,
    pub probabilities: Vec<ClassProbability>,
    pub explained_label: String,
    pub fidelity: f64,
    pub low_fidelity: bool,
    pub entries: Vec<ReportEntry>,
    pub explanation: Explanation,
    pub rationale: Option<String>,
    pub coping: Option<String>,
    pub attributes: Vec<AttributeEntry>,
}

impl Report {
    /// Assemble a report. `class_names[i]` names class `i`; `display_value`
    /// renders an encoded feature value for humans.
    pub fn new(
        class_names: &[String],
        probabilities: &[f64],
        predicted: usize,
        explanation: Explanation,
        attributes: Vec<(String, String)>,
        display_value: impl Fn(usize, f64) -> String,
    ) -> Self {
        let name = |i: usize| {
            class_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("class {i}"))
        };
        let entries = explanation
            .contributions
            .iter()
            .map(|c| ReportEntry {
                feature: c.feature.clone(),
                value: display_value(c.feature_index, c.value),
                weight: format!("{:+.4}", c.coefficient),
                direction: c.direction,
                effect: c.direction.label().to_string(),
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            predicted_label: name(predicted),
            probabilities: probabilities
                .iter()
                .enumerate()
                .map(|(i, &p)| ClassProbability {
                    label: name(i),
                    probability: p,
                    percent: format!("{:.1}%", p * 100.0),
                })
                .collect(),
            explained_label: name(explanation.label),
            fidelity: explanation.fidelity,
            low_fidelity: explanation.is_low_fidelity(),
            entries,
            explanation,
            rationale: None,
            coping: None,
            attributes: attributes
                .into_iter()
                .map(|(name, value)| AttributeEntry { name, value })
                .collect(),
        }
    }

    pub fn with_rationale(mut self, rationale: Option<String>, coping: Option<String>) -> Self {
        self.rationale = rationale;
        self.coping = coping;
        self
    }

    pub fn render(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Html => self.render_html(),
            ReportFormat::Markdown => Ok(self.render_markdown()),
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    pub fn render_html(&self) -> Result<String, ReportError> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        let mut data = serde_json::to_value(self)?;
        data["fidelity"] = serde_json::Value::String(format!("{:.3}", self.fidelity));
        handlebars
            .render_template(HTML_TEMPLATE, &data)
            .map_err(|e| ReportError::Template(e.to_string()))
    }

    pub fn render_markdown(&self) -> String {
        let mut out = String::from("# Prediction & Explanation Report\n\n");
        out.push_str(&format!(
            "Generated {} · report `{}`\n\n",
            self.created_at, self.id
        ));
        out.push_str(&format!(
            "**Predicted condition:** {}\n\n",
            self.predicted_label
        ));
        out.push_str("| Class | Probability |\n|---|---|\n");
        for p in &self.probabilities {
            out.push_str(&format!("| {} | {} |\n", p.label, p.percent));
        }
        out.push_str(&format!(
            "\n## Local explanation for {} (fidelity {:.3})\n\n",
            self.explained_label, self.fidelity
        ));
        if self.low_fidelity {
            out.push_str("> **Warning:** low local fidelity; treat this ranking with caution.\n\n");
        }
        if self.entries.is_empty() {
            out.push_str("No feature moved the prediction in this neighbourhood.\n");
        } else {
            out.push_str("| Feature | Value | Weight | Effect |\n|---|---|---|---|\n");
            for e in &self.entries {
                out.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    e.feature, e.value, e.weight, e.effect
                ));
            }
        }
        if let Some(rationale) = &self.rationale {
            out.push_str(&format!("\n## Explanation\n\n{rationale}\n"));
        }
        if let Some(coping) = &self.coping {
            out.push_str(&format!(
                "\n## Coping Mechanisms and Next Steps\n\n{coping}\n"
            ));
        }
        out.push_str("\n## Input\n\n");
        for a in &self.attributes {
            out.push_str(&format!("- **{}**: {}\n", a.name, a.value));
        }
        out
    }

    pub fn render_text(&self) -> String {
        let mut out = format!("Predicted: {}\n", self.predicted_label);
        for p in &self.probabilities {
            out.push_str(&format!("  {:<24} {:>7}\n", p.label, p.percent));
        }
        out.push_str(&format!(
            "\nExplanation for '{}' (fidelity {:.3}{})\n",
            self.explained_label,
            self.fidelity,
            if self.low_fidelity { ", LOW" } else { "" }
        ));
        if self.entries.is_empty() {
            out.push_str("  (no contributing features)\n");
        }
        for e in &self.entries {
            out.push_str(&format!(
                "  {} {:<24} = {:<12} {:>9}  {}\n",
                e.direction.sign(),
                e.feature,
                e.value,
                e.weight,
                e.effect
            ));
        }
        if let Some(rationale) = &self.rationale {
            out.push_str(&format!("\n{rationale}\n"));
        }
        if let Some(coping) = &self.coping {
            out.push_str(&format!("\nCoping mechanisms and next steps:\n{coping}\n"));
        }
        out
    }

    /// Render and write to `path`, creating parent directories.
    pub fn write_to(&self, path: &Path, format: ReportFormat) -> Result<(), ReportError> {
        let rendered = self.render(format)?;
        let write_err = |source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, rendered).map_err(write_err)
    }

    /// Default file name for this report in the given format.
    pub fn file_name(&self, format: ReportFormat) -> String {
        format!("report-{}.{}", self.id, format.extension())
    }
}
