//! VIIRS nighttime-lights command-line tool.
//!
//! Searches the scene catalog, builds quality-masked composites and
//! rolling-window composites, lists the public S3 archive and generates
//! STAC items for downloaded granules.

mod commands;
mod config;
mod filters;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use composite::CancellationToken;
use config::NtlConfig;

#[derive(Parser, Debug)]
#[command(name = "ntl")]
#[command(about = "VIIRS nighttime-lights catalog search and compositing")]
struct Args {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "NTL_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search the scene catalog
    Search(commands::SearchArgs),
    /// Composite matching scenes over a bounding box
    Composite(commands::CompositeArgs),
    /// Rolling-window composites over matching scenes
    Rolling(commands::RollingArgs),
    /// List objects in an S3 bucket
    ListS3(commands::ListS3Args),
    /// Build STAC items for a directory of granules
    Stac(commands::StacArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config = NtlConfig::load(args.config.as_deref())?;
    config.validate()?;
    info!(config = ?args.config, "Loaded configuration");

    // Ctrl+C stops an in-flight accumulation
    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            cancel_on_signal.cancel();
        }
    });

    match &args.command {
        Command::Search(a) => commands::search(&config, a),
        Command::Composite(a) => commands::composite(&config, a, &cancel).await,
        Command::Rolling(a) => commands::rolling(&config, a, &cancel).await,
        Command::ListS3(a) => commands::list_s3(&config, a).await,
        Command::Stac(a) => commands::stac(&config, a),
    }
}
