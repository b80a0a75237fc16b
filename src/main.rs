//! Triplog - trip logging client
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use triplog::cli::{commands, Cli, Commands};
use triplog::config::{Config, ConfigManager};
use triplog::context::AppContext;
use triplog::error::TriplogResult;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> TriplogResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    if let Some(url) = cli.api_url.clone() {
        config.api.base_url = url;
    }
    if let Some(key) = cli.api_key.clone() {
        config.api.api_key = key;
    }

    init_logging(cli.verbose, &config);
    triplog::ui::init_theme();
    debug!("Using config {}", config_manager.path().display());

    // Config management never touches the session
    if let Commands::Config(args) = cli.command {
        return commands::config(args, &config_manager, &config).await;
    }

    let app = AppContext::open(config).await?;
    let result = match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Login(args) => commands::login(args, &app).await,
        Commands::Logout => commands::logout(&app).await,
        Commands::Status(args) => commands::status(args, &app).await,
        Commands::Whoami(args) => commands::whoami(args, &app).await,
        Commands::Trips(args) => commands::trips(args, &app).await,
        Commands::Cache(args) => commands::cache(args, &app).await,
    };
    app.shutdown().await;
    result
}

/// 0 = warn, 1 = info, 2+ = debug; `general.verbose` counts as one `-v`.
/// Logs go to stderr so command output can be piped.
fn init_logging(verbose: u8, config: &Config) {
    let level = verbose.max(u8::from(config.general.verbose));
    let filter = match level {
        0 => EnvFilter::new("triplog=warn"),
        1 => EnvFilter::new("triplog=info"),
        _ => EnvFilter::new("triplog=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
