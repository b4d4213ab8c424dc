//! docchat - documentation chat assistant CLI
//!
#![doc = "docchat - documentation chat assistant CLI"]
#![doc = "Main entry point for the docchat application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docchat::cli::{Cli, Commands};
use docchat::commands;
use docchat::commands::history::HistoryArgs;
use docchat::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing before anything can log
    init_tracing(cli.verbose, cli.log_json);

    // Load configuration
    let config = Config::load(cli.config_path(), &cli)?;
    tracing::debug!("Loaded configuration from {}", cli.config_path());

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Chat { page } => {
            if let Some(p) = &page {
                tracing::debug!("Using page override: {}", p);
            }
            commands::chat::run_chat(config, page).await?;
            Ok(())
        }
        Commands::History {
            remote,
            limit,
            offset,
            json,
        } => {
            tracing::info!("Starting history command");
            let args = HistoryArgs {
                remote,
                limit,
                offset,
                json,
            };
            commands::history::show_history(&config, args).await?;
            Ok(())
        }
        Commands::Clear => {
            commands::history::clear_history(&config)?;
            Ok(())
        }
        Commands::Reset => {
            commands::history::reset_session(&config)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins when set. Logs go to stderr so JSON output on stdout
/// stays machine-readable.
fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "docchat=debug" } else { "docchat=warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
