//! Strata daemon - serves per-asset agent memory over HTTP

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use strata::config::Config;
use strata::embedding::{build_embedder, check_dimension};
use strata::error::Result;
use strata::memory::MemoryRegistry;
use strata::query::DiverseQueryEngine;
use strata::server::MemoryServer;

/// Strata - tiered associative memory for LLM trading agents
#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Tiered associative memory for LLM trading agents")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the memory server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,strata=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting Strata daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config);

    let registry = Arc::new(MemoryRegistry::from_config(&config)?);

    if config.storage.load_on_start {
        tracing::info!("Restoring memory from: {}", config.storage.data_dir.display());
        let report = registry.load_local(&config.storage.data_dir).await;
        if !report.is_complete() {
            tracing::warn!(
                "{} tenants started empty after failed loads",
                report.failed.len()
            );
        }
    }

    tracing::info!("Initializing {:?} embedding provider", config.embedding.provider);
    let embedder = build_embedder(&config.embedding)?;
    check_dimension(embedder.as_ref(), config.memory.embedding_dim)?;

    let engine = Arc::new(DiverseQueryEngine::new(registry, embedder, &config.query));

    let server = MemoryServer::new(config, engine);
    server.serve().await?;

    tracing::info!("Strata daemon stopped");
    Ok(())
}
