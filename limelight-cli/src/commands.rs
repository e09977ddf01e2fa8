//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, ExplainArgs, OutputFormat};
use limelight_core::{ExplainRequest, FeatureDistribution, FeatureSpace};
use limelight_service::{
    AppConfig, AttributeSchema, PredictionRequest, PredictionService, RawRecord, ReportFormat,
    load_config, load_reference,
};
use std::path::Path;

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Explain(args) => handle_explain(args, workspace).await,
        Commands::Describe => handle_describe(workspace),
        Commands::Config { action } => handle_config(action, workspace),
    }
}

fn load(workspace: &Path) -> anyhow::Result<AppConfig> {
    load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Html => ReportFormat::Html,
            OutputFormat::Markdown => ReportFormat::Markdown,
        }
    }
}

async fn handle_explain(args: ExplainArgs, workspace: &Path) -> anyhow::Result<()> {
    let mut config = load(workspace)?;
    if let Some(budget) = args.budget {
        config.explainer.feature_budget = budget;
    }
    if args.rationale {
        config.rationale.enabled = true;
    }

    let text = std::fs::read_to_string(&args.record)
        .map_err(|e| anyhow::anyhow!("Failed to read record {}: {}", args.record.display(), e))?;
    let record: RawRecord = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("Invalid record {}: {}", args.record.display(), e))?;

    let service = PredictionService::from_config(&config, workspace)?;
    if args.rationale && !service.has_generator() {
        eprintln!(
            "Rationale unavailable: set {} to enable it.",
            config.rationale.api_key_env
        );
    }

    let request = PredictionRequest {
        record,
        explain: ExplainRequest {
            seed: args.seed,
            num_samples: args.samples,
            ..Default::default()
        },
        label: args.label,
        rationale: args.rationale,
    };
    let report = service.predict(request).await?;

    let format = ReportFormat::from(args.format);
    let output = match args.output {
        Some(path) => Some(path),
        None if args.save => Some(config.report.output_dir.join(report.file_name(format))),
        None => None,
    };
    match output {
        Some(path) => {
            let path = if path.is_absolute() {
                path
            } else {
                workspace.join(path)
            };
            report.write_to(&path, format)?;
            println!("Report written to {}", path.display());
        }
        None => print!("{}", report.render(format)?),
    }
    Ok(())
}

fn handle_describe(workspace: &Path) -> anyhow::Result<()> {
    let config = load(workspace)?;
    let artifacts = config.artifacts.resolved(workspace);
    let schema = AttributeSchema::from_file(&artifacts.schema)?;
    let table = load_reference(&artifacts.reference, &schema)?;
    let space = FeatureSpace::from_reference(&table)?;

    println!(
        "Feature space: {} features from {} reference rows",
        space.len(),
        table.row_count()
    );
    for (i, spec) in space.specs().iter().enumerate() {
        match &spec.distribution {
            FeatureDistribution::Continuous { mean, std_dev } => {
                println!(
                    "  {:<24} continuous   mean {:>9.3}  std {:>8.3}",
                    spec.name, mean, std_dev
                );
            }
            FeatureDistribution::Categorical {
                values,
                frequencies,
            } => {
                let levels = values
                    .iter()
                    .zip(frequencies)
                    .map(|(v, f)| format!("{}={:.0}%", schema.display_value(i, *v), f * 100.0))
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("  {:<24} categorical  {}", spec.name, levels);
            }
        }
    }
    println!("Classes: {}", schema.target_classes.join(", "));
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".limelight");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&AppConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
