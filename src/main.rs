use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leaguedex::commands::{areas, seasons};
use leaguedex::config::Config;
use leaguedex::error::{CatalogError, Error};

#[derive(Parser)]
#[command(
    name = "leaguedex",
    version,
    about = "Football region and competition catalog scraper",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape regions and competitions, sync the store and export the workbook
    Areas,

    /// Discover seasons for every stored competition
    Seasons,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;

    let format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());
    setup_tracing(&format, &config.logging.level, cli.verbose)?;

    let outcome = match cli.command {
        Commands::Areas => areas::run(&config).await.map(|summary| summary.print()),
        Commands::Seasons => seasons::run(&config).await.map(|summary| summary.print()),
    };

    if let Err(e) = &outcome {
        match e.downcast_ref::<Error>() {
            Some(err) => tracing::error!(
                category = err.category().label(),
                fatal = err.is_fatal(),
                error = %e,
                "Run failed"
            ),
            None => tracing::error!(error = %e, "Run failed"),
        }
        return outcome;
    }

    tracing::info!("leaguedex completed successfully");
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let default_filter = if verbose {
        String::from("leaguedex=debug,info")
    } else {
        format!("leaguedex={level},warn")
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
