mod cli;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use resource_lifecycle::CoordinatorConfig;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lifecycle")]
#[command(about = "Drive the resource lifecycle coordinator against an in-memory fleet")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create, activate, disable and delete a group end to end
    Demo,
    /// Execute a JSON array of steps
    Run {
        script: PathBuf,
        /// External ids whose activation the provisioner refuses
        #[arg(long)]
        decline: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = CoordinatorConfig::from_env().context("failed to load configuration")?;

    let (steps, decline) = match cli.command {
        Command::Demo => (cli::script::demo_steps(), Vec::new()),
        Command::Run { script, decline } => {
            let raw = tokio::fs::read_to_string(&script)
                .await
                .with_context(|| format!("failed to read script '{}'", script.display()))?;
            let steps = serde_json::from_str(&raw)
                .with_context(|| format!("invalid script '{}'", script.display()))?;
            (steps, decline)
        }
    };

    let report = cli::script::run(config, steps, decline).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode report")?
    );
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("resource_lifecycle=info,lifecycle=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
