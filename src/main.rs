//! simcache - content-addressed baseline cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use simcache::cli::{Cli, Commands};
use simcache::config::ConfigManager;
use simcache::error::{SimcacheError, SimcacheResult};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> SimcacheResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("simcache=warn"),
        1 => EnvFilter::new("simcache=info"),
        _ => EnvFilter::new("simcache=debug"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    let local_config_path = if cli.no_local {
        debug!("Local config discovery disabled (--no-local)");
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| SimcacheError::io("getting current directory", e))?;
        let found = ConfigManager::find_local_config(&cwd);
        if let Some(ref path) = found {
            debug!("Found local config: {}", path.display());
        }
        found
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    match cli.command {
        Commands::Build(args) => simcache::cli::commands::build(args, &config).await,
        Commands::Check(args) => simcache::cli::commands::check(args, &config).await,
        Commands::Locate(args) => simcache::cli::commands::locate(args, &config).await,
        Commands::Status(args) => simcache::cli::commands::status(args, &config).await,
        Commands::Config(args) => {
            simcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
