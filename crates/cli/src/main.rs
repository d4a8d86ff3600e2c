mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use vigil_core::config::load_dotenv;
use vigil_core::Config;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs on stderr so stdout stays valid JSON.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    load_dotenv();
    let args = CliArgs::parse();

    let config = match args.preset.as_deref() {
        Some(name) => Config::for_preset(name),
        None => Config::from_env(),
    }
    .context("failed to load configuration")?;

    match args.command {
        Command::Detect(detect) => commands::detect(config, detect, args.pretty).await,
        Command::Profile { input } => commands::profile(&input, args.pretty),
        Command::Presets => commands::presets(args.pretty),
    }
}
