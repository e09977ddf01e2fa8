//! Limelight CLI: explain individual classifier predictions.
//!
//! Loads the configured artifacts, predicts a raw attribute record, explains
//! the prediction locally and renders a report.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Limelight: local explanations for black-box classifier predictions
#[derive(Parser, Debug)]
#[command(name = "limelight", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (artifact paths and `.limelight/config.toml` are resolved here)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum Commands {
    /// Predict a record and explain the prediction
    Explain(ExplainArgs),
    /// Summarise the feature space built from the reference dataset
    Describe,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub(crate) struct ExplainArgs {
    /// JSON file holding the raw attribute record
    #[arg(short, long)]
    record: PathBuf,

    /// Sampler seed (defaults to the configured seed)
    #[arg(long)]
    seed: Option<u64>,

    /// Neighbourhood size, including the record itself
    #[arg(long)]
    samples: Option<usize>,

    /// Maximum number of contributing features
    #[arg(long)]
    budget: Option<usize>,

    /// Explain this class instead of the predicted one
    #[arg(long)]
    label: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(short, long, conflicts_with = "save")]
    output: Option<PathBuf>,

    /// Write the report into the configured report directory
    #[arg(long)]
    save: bool,

    /// Ask the configured text generator for a rationale and coping suggestions
    #[arg(long)]
    rationale: bool,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OutputFormat {
    Text,
    Json,
    Html,
    Markdown,
}

#[derive(clap::Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Write a default `.limelight/config.toml` into the workspace
    Init,
    /// Print the effective layered configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)));

    let log_dir = directories::ProjectDirs::from("dev", "limelight", "limelight")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "limelight.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace).await
}
