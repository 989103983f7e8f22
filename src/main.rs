//! DataHub API Server
//!
//! Run with: cargo run -- serve
//!
//! # Configuration
//!
//! Settings come from `--config`, else the first of
//! `~/.config/datahub/config.toml`, `/etc/datahub/config.toml` and `./config.toml`.
//! `DATAHUB_*` environment variables override file values, and `--host` / `--port`
//! override both. `RUST_LOG` takes precedence over `logging.level`.

use clap::{Parser, Subcommand};
use datahub::api::{serve, AppState};
use datahub::config::{generate_default_config, Config, LoadedConfig, LoggingConfig};
use datahub::store::Database;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "datahub")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Metrics, customer segments and experiments behind a JSON API")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print a default config file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, host, port } => {
            let loaded = match config {
                Some(path) => LoadedConfig {
                    config: Config::load_with_env(&path)?,
                    source: Some(path),
                    skipped: Vec::new(),
                },
                None => Config::load_default(),
            };

            let mut config = loaded.config;
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }

            init_tracing(&config.logging);

            for error in &loaded.skipped {
                tracing::warn!("Skipped config file: {}", error);
            }
            match &loaded.source {
                Some(path) => tracing::info!("Loaded config from {:?}", path),
                None => tracing::info!("Using default config with environment overrides"),
            }

            run_server(config).await
        }
        Commands::InitConfig => {
            print!("{}", generate_default_config());
            Ok(())
        }
    }
}

/// Initialize tracing with a pretty or JSON formatter
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("datahub={},tower_http=debug", logging.level))
    });

    let json = logging.is_json();
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Starting DataHub API server v{}", env!("CARGO_PKG_VERSION"));

    let store_config = config.database.store_config();
    tracing::info!("Database file: {:?}", store_config.path);

    let db = Arc::new(Database::open(store_config)?);

    let state = AppState::new(db, config.api.clone());
    serve(state, &config.api).await?;

    tracing::info!("DataHub API server stopped");
    Ok(())
}
