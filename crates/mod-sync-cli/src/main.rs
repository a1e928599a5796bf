mod commands;
mod config;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::sync::SyncArgs;

#[derive(Parser)]
#[command(name = "mod-sync")]
#[command(about = "Resolve and download mods for a platform version from remote repositories")]
struct Cli {
    /// Path to a config file (defaults to ~/.config/mod-sync/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and download packages from every configured backend
    Sync {
        /// Package IDs to sync (defaults to `packages` in the config)
        packages: Vec<String>,
        /// Target platform version, e.g. 1.19.2
        #[arg(long)]
        platform: Option<String>,
        /// Maximum number of attempts in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Stop at the first backend that delivers each package
        #[arg(long)]
        first_success: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Copy synced artifacts into this directory
        #[arg(long)]
        install_dir: Option<PathBuf>,
    },
    /// List configured backends
    Backends,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app_config = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Sync {
            packages,
            platform,
            concurrency,
            first_success,
            json,
            install_dir,
        } => {
            let args = SyncArgs {
                packages,
                platform,
                concurrency,
                first_success,
                json,
                install_dir,
            };
            commands::sync::run(&app_config, args).await
        }
        Command::Backends => commands::backends::run(&app_config),
    }
}
