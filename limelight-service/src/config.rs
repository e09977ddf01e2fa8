//! Application configuration.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from the platform config directory (`config.toml`) and/or
//! `.limelight/config.toml` in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use limelight_core::ExplainerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the limelight service and CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub explainer: ExplainerConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub rationale: RationaleConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Locations of the schema, reference data and model artifacts.
///
/// Relative paths are resolved against the workspace directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactsConfig {
    #[serde(default = "default_schema_path")]
    pub schema: PathBuf,
    #[serde(default = "default_reference_path")]
    pub reference: PathBuf,
    #[serde(default = "default_model_path")]
    pub model: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            schema: default_schema_path(),
            reference: default_reference_path(),
            model: default_model_path(),
        }
    }
}

impl ArtifactsConfig {
    /// Resolve every artifact path against `workspace`.
    pub fn resolved(&self, workspace: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                workspace.join(p)
            }
        };
        Self {
            schema: resolve(&self.schema),
            reference: resolve(&self.reference),
            model: resolve(&self.model),
        }
    }
}

/// Bounds on the black-box classifier call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Timeout for one explanation's batched scoring, in seconds.
    #[serde(default = "default_classifier_timeout")]
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_classifier_timeout(),
        }
    }
}

/// Natural-language rationale settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_rationale_model")]
    pub model: String,
    /// Override of the Gemini API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Explicit key; prefer `api_key_env` so keys stay out of config files.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_rationale_timeout")]
    pub timeout_secs: u64,
}

impl Default for RationaleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_rationale_model(),
            base_url: None,
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_rationale_timeout(),
        }
    }
}

/// Where rendered reports go when no explicit output path is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_report_dir(),
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("artifacts/schema.json")
}

fn default_reference_path() -> PathBuf {
    PathBuf::from("artifacts/reference.csv")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("artifacts/model.json")
}

fn default_classifier_timeout() -> u64 {
    5
}

fn default_rationale_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_rationale_timeout() -> u64 {
    30
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("reports")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `LIMELIGHT_`)
/// 3. Workspace-local config (`.limelight/config.toml`)
/// 4. User config (platform config dir, `config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&AppConfig>,
) -> Result<AppConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

    // User-level config
    if let Some(dirs) = directories::ProjectDirs::from("dev", "limelight", "limelight") {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    // Workspace-level config
    if let Some(ws) = workspace {
        let ws_config = ws.join(".limelight").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // Environment variables (LIMELIGHT_EXPLAINER__NUM_SAMPLES, LIMELIGHT_RATIONALE__MODEL, etc.)
    figment = figment.merge(Env::prefixed("LIMELIGHT_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.classifier.timeout_secs, 5);
        assert_eq!(config.explainer.num_samples, 5000);
        assert!(!config.rationale.enabled);
        assert_eq!(config.rationale.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.artifacts.schema, PathBuf::from("artifacts/schema.json"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_load_config_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.explainer.feature_budget, 10);
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = AppConfig::default();
        overrides.explainer.num_samples = 750;
        overrides.rationale.model = "gemini-1.5-pro".to_string();

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.explainer.num_samples, 750);
        assert_eq!(config.rationale.model, "gemini-1.5-pro");
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let ws_dir = dir.path().join(".limelight");
        std::fs::create_dir_all(&ws_dir).unwrap();
        std::fs::write(
            ws_dir.join("config.toml"),
            r#"
[explainer]
num_samples = 1200
feature_budget = 4

[classifier]
timeout_secs = 2

[artifacts]
model = "models/softmax.json"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.explainer.num_samples, 1200);
        assert_eq!(config.explainer.feature_budget, 4);
        assert_eq!(config.explainer.seed, 42);
        assert_eq!(config.classifier.timeout_secs, 2);
        assert_eq!(config.artifacts.model, PathBuf::from("models/softmax.json"));
        assert_eq!(config.artifacts.schema, PathBuf::from("artifacts/schema.json"));
    }

    #[test]
    fn test_artifact_paths_resolve_against_workspace() {
        let artifacts = ArtifactsConfig {
            model: PathBuf::from("/opt/models/m.json"),
            ..Default::default()
        };
        let resolved = artifacts.resolved(Path::new("/srv/app"));
        assert_eq!(resolved.schema, PathBuf::from("/srv/app/artifacts/schema.json"));
        assert_eq!(resolved.model, PathBuf::from("/opt/models/m.json"));
    }
}
