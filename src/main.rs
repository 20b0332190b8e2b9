//! clibs - native library build cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use clibs::cli::{Cli, Commands};
use clibs::config::{Config, ConfigManager};
use clibs::error::ClibsResult;
use console::style;
use std::process::ExitCode;
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
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ClibsResult<()> {
    let cli = Cli::parse();

    // Completions need neither config nor logging
    let command = match cli.command {
        Commands::Completions(args) => return clibs::cli::commands::completions(args),
        other => other,
    };

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    clibs::ui::init_theme();

    match command {
        Commands::Completions(args) => clibs::cli::commands::completions(args),
        Commands::Build(args) => clibs::cli::commands::build(args, &config).await,
        Commands::Export(args) => clibs::cli::commands::export(args, &config).await,
        Commands::List(args) => clibs::cli::commands::list(args, &config).await,
        Commands::Target(args) => clibs::cli::commands::target(args, &config).await,
        Commands::Config(args) => clibs::cli::commands::config(args, &config_manager, &config).await,
    }
}

/// 0 = warn, 1 = info (including build output), 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("clibs=warn"),
        1 => EnvFilter::new("clibs=info"),
        _ => EnvFilter::new("clibs=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if config.general.json_logs() {
        builder.json().init();
    } else {
        builder.init();
    }
}
