//! hydramap command-line client
//!
//! Reads and writes Data API resources through the hydramap-core mapper, so
//! writes carry only the fields that changed since the resource was fetched.
//!
//! # Configuration
//!
//! Environment variables:
//! - `HYDRAMAP_API_URL`: Data API base URL (default: http://localhost:8000)
//! - `HYDRAMAP_DECLARATIONS`: entity declarations file
//! - `HYDRAMAP_TOKEN`: access token
//! - `HYDRAMAP_AUTH_SCHEME`: `bearer` or `jwt`
//! - `RUST_LOG`: log filter (default: warn, or debug with `--verbose`)

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    connect, ConfigCommand, DeleteCommand, FetchCommand, ListCommand, SchemaCommand, SetCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "hydramap")]
#[command(version)]
#[command(about = "Read and write JSON-LD/Hydra Data API resources", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log requests and cache decisions
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the resolved schema of an entity type
    Schema(SchemaCommand),

    /// Fetch one resource and print its graph
    Fetch(FetchCommand),

    /// List resources of an entity type
    List(ListCommand),

    /// Change fields of a resource and save the difference
    Set(SetCommand),

    /// Delete a resource
    Delete(DeleteCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Schema(cmd)) => {
            let mut manager = connect(&config)?;
            cmd.run(&mut manager)?;
        }
        Some(Commands::Fetch(cmd)) => {
            let mut manager = connect(&config)?;
            cmd.run(&mut manager).await?;
        }
        Some(Commands::List(cmd)) => {
            let mut manager = connect(&config)?;
            cmd.run(&mut manager).await?;
        }
        Some(Commands::Set(cmd)) => {
            let mut manager = connect(&config)?;
            cmd.run(&mut manager).await?;
        }
        Some(Commands::Delete(cmd)) => {
            let mut manager = connect(&config)?;
            cmd.run(&mut manager).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
