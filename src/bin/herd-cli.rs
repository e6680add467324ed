//! Herd CLI - Command-line interface for the Herd runtime
//!
//! Loads a JSON model description, checks it, and runs it for a number of
//! steps.

use anyhow::Context;
use clap::{Parser, Subcommand};
use herd::interpreter::{Model, ModelDesc};
use herd::runtime::report::CollectingSink;
use herd::runtime::{ExecutionOutcome, Runtime, RuntimeConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "herd")]
#[command(about = "Statement runtime for multi-level agent-based models", long_about = None)]
struct Cli {
    /// Runtime configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model and print its diagnostics
    Check {
        /// Model description (JSON)
        #[arg(short, long)]
        model: PathBuf,
    },

    /// Run a model and print the live agents
    Run {
        /// Model description (JSON)
        #[arg(short, long)]
        model: PathBuf,

        /// Number of steps to execute
        #[arg(short, long, default_value = "1")]
        steps: usize,
    },
}

fn load_model(path: &Path) -> anyhow::Result<Model> {
    let desc = ModelDesc::load(path).with_context(|| format!("reading {}", path.display()))?;
    Model::build(&desc).with_context(|| format!("building {}", desc.name))
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };

    match cli.command {
        Commands::Check { model } => {
            let model = load_model(&model)?;
            for diagnostic in model.diagnostics() {
                println!("{}: {}", diagnostic.statement, diagnostic.message);
            }
            println!(
                "{}: {} diagnostic(s)",
                model.name(),
                model.diagnostics().len()
            );
        }

        Commands::Run { model, steps } => {
            let model = load_model(&model)?;
            let sink = Arc::new(CollectingSink::default());
            let runtime = Runtime::with_sink(config, model.world().clone(), sink.clone())?;

            if let ExecutionOutcome::Failed(error) = model.initialize(&runtime) {
                anyhow::bail!("init failed: {}", error);
            }
            for step in 0..steps {
                let failures = model
                    .step(&runtime)
                    .into_iter()
                    .filter(|(_, outcome)| matches!(outcome, ExecutionOutcome::Failed(_)))
                    .count();
                tracing::info!(step, failures, "step done");
            }
            for report in sink.reports() {
                eprintln!("{:?}: {}", report.severity, report.message);
            }
            println!("{}", serde_json::to_string_pretty(&model.snapshot())?);
        }
    }

    Ok(())
}
