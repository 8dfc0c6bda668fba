mod cli;
mod handlers;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use gorails_dl::ConfigManager;
use handlers::RunContext;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Validate CLI arguments first
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(args.verbose);

    let mut config_manager = match &args.config {
        Some(path) => ConfigManager::with_file(path)?,
        None => ConfigManager::new()?,
    };

    if !handlers::should_skip_config_validation(&args.command) {
        if let Err(e) = config_manager.validate() {
            eprintln!("Configuration validation failed: {}", e);
            eprintln!(
                "Fix {:?} or run 'gorails-dl config reset'",
                config_manager.config_file()
            );
            process::exit(1);
        }
    }

    if let Commands::Config { action } = args.command {
        return handlers::handle_config(&mut config_manager, action).await;
    }

    let ctx = RunContext::new(config_manager.config(), &args)?;

    let result = match args.command {
        Commands::Video { url } => handlers::handle_video(&ctx, url).await,
        Commands::Playlist { url } => handlers::handle_playlist(&ctx, url).await,
        Commands::AllSeries => handlers::handle_all_series(&ctx).await,
        Commands::Auth { session, forget } => handlers::handle_auth(&ctx, session, forget).await,
        Commands::Info => handlers::handle_info(&ctx).await,
        Commands::Config { .. } => Ok(()),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .init();
}
