use std::path::PathBuf;

use clap::{Parser, Subcommand};
use strata::config::Config;
use strata_cli::commands::{MemoryCommand, QueryCommand, StatsCommand, open_registry};
use strata_cli::error::CliResult;
use strata_cli::output::OutputFormat;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "strata-cli")]
#[command(about = "Strata CLI - Inspect persisted agent memory")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to memory root")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Record browsing commands")]
    Memory(MemoryCommand),

    #[clap(about = "Show per-tenant statistics")]
    Stats(StatsCommand),

    #[clap(about = "Run a diverse similarity query")]
    Query(QueryCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let config = Config::load(cli.config.as_deref())?;
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.storage.data_dir.clone());

    let registry = open_registry(&config, &data_dir).await?;

    match &cli.command {
        Command::Memory(cmd) => cmd.execute(&registry, format).await,
        Command::Stats(cmd) => cmd.execute(&registry, format).await,
        Command::Query(cmd) => cmd.execute(registry, &config, format).await,
    }
}
