//! Neon Clicker CLI
//!
//! Command-line interface for running the game server.

use anyhow::Context;
use clap::{Parser, Subcommand};
use neon_core::{Clock, SystemClock};
use neon_node::config::LoggingSettings;
use neon_node::{LogFormat, NodeConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "neon")]
#[command(version)]
#[command(about = "Neon Clicker - idle clicker game server for Telegram Mini Apps", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "neon.toml")]
    config: PathBuf,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game server
    Serve {
        /// Listen address, overrides `server.listen_addr`
        #[arg(short, long)]
        listen: Option<String>,

        /// SQLite database path, overrides `storage.path`
        #[arg(long)]
        storage_path: Option<PathBuf>,

        /// Telegram bot token used to verify launch data
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        bot_token: Option<String>,
    },

    /// Print the effective configuration with secrets redacted
    Config,

    /// Print signed launch data for local testing
    LaunchData {
        /// Telegram user id
        #[arg(long)]
        user_id: i64,

        /// Display name
        #[arg(long, default_value = "Dev")]
        first_name: String,

        /// Bot token to sign with
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        bot_token: String,
    },

    /// Version information
    Version,
}

fn init_logging(verbose: bool, settings: &LoggingSettings) {
    let env_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level))
    };

    let registry = tracing_subscriber::registry().with(env_filter);
    match settings.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false),
            )
            .init(),
    }
}

fn load_config(path: &Path) -> anyhow::Result<(NodeConfig, bool)> {
    if path.exists() {
        let config = NodeConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((NodeConfig::default(), false))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (mut config, from_file) = load_config(&cli.config)?;
    init_logging(cli.verbose, &config.logging);

    match cli.command {
        Commands::Serve {
            listen,
            storage_path,
            bot_token,
        } => {
            if from_file {
                tracing::info!("Config: {:?}", cli.config);
            } else {
                tracing::info!("Config {:?} not found, using defaults", cli.config);
            }

            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            if let Some(path) = storage_path {
                config.storage.path = path.to_string_lossy().into_owned();
            }
            if let Some(token) = bot_token {
                config.auth.bot_token = Some(token);
            }

            tracing::info!("Neon Clicker v{}", env!("CARGO_PKG_VERSION"));
            tracing::info!("Storage: {:?} at {}", config.storage.backend, config.storage.path);
            tracing::info!(
                "Catalog: {} producers, {} donation goals",
                config.economy.producers.len(),
                config.economy.goals.len()
            );

            neon_node::serve(config).await?;
        }

        Commands::Config => {
            print!("{}", config.to_redacted_toml()?);
        }

        Commands::LaunchData {
            user_id,
            first_name,
            bot_token,
        } => {
            let user = serde_json::json!({ "id": user_id, "first_name": first_name }).to_string();
            let auth_date = SystemClock.now().to_string();
            let raw = neon_auth::sign_init_data(
                &[("user", user.as_str()), ("auth_date", auth_date.as_str())],
                &bot_token,
            );
            println!("Authorization: tma {}", raw);
        }

        Commands::Version => {
            println!("Neon Clicker v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
