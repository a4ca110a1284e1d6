//! repro-fetch - reproducible package fetcher
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use repro_fetch::cli::args::LogFormat;
use repro_fetch::cli::{AppContext, Cli, Commands};
use repro_fetch::config::ConfigManager;
use repro_fetch::error::ReproResult;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  {} {}", style("Caused by:").dim(), cause);
                source = std::error::Error::source(cause);
            }
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> ReproResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = config_manager.load().await?;

    let log_format = cli.log_format.unwrap_or(if config.general.log_format == "json" {
        LogFormat::Json
    } else {
        LogFormat::Text
    });
    init_logging(cli.verbose, log_format);
    debug!("Using config {}", config_manager.path().display());

    // Ctrl-C cancels in-flight downloads and installers
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            signal_token.cancel();
        }
    });

    let app = AppContext::new(&cli, config, config_manager, cancel);

    // Dispatch to command
    match cli.command {
        Commands::Hash(args) => repro_fetch::cli::commands::hash(args, &app).await,
        Commands::Download(args) => repro_fetch::cli::commands::download(args, &app).await,
        Commands::Install(args) => repro_fetch::cli::commands::install(args, &app).await,
        Commands::Cache(args) => repro_fetch::cli::commands::cache(args, &app).await,
        Commands::Script(args) => repro_fetch::cli::commands::script(args, &app).await,
        Commands::Config(args) => repro_fetch::cli::commands::config(args, &app).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; logs go to stderr
fn init_logging(verbose: u8, format: LogFormat) {
    let filter = match verbose {
        0 => EnvFilter::new("repro_fetch=warn"),
        1 => EnvFilter::new("repro_fetch=info"),
        _ => EnvFilter::new("repro_fetch=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.without_time().init(),
    }
}
