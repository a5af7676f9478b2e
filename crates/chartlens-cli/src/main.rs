//! ChartLens CLI - sign in to the identity provider and run chart analyses
//! from the terminal.
//!
//! This binary is the composition root: it builds the one `SessionManager`
//! for the process and hands it to the command handlers.

mod commands;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chartlens_core::{Config, SessionManager};

/// Set to 1 to also write logs to a daily file in the data directory
const LOG_FILE_ENV: &str = "CHARTLENS_LOG_FILE";

/// Log file name prefix for the rolling appender
const LOG_FILE_PREFIX: &str = "chartlens.log";

/// Initialize the tracing subscriber for logging.
/// The returned guard must live until exit so buffered file logs are flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = std::env::var(LOG_FILE_ENV)
        .ok()
        .filter(|value| value == "1")
        .and_then(|_| config.data_dir().ok());

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let (mut config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let _log_guard = init_tracing(&config);
    if let Some(e) = config_error {
        warn!(error = %e, "Failed to load config, using defaults");
    }
    info!("ChartLens starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        commands::print_usage();
        return Ok(());
    };
    let rest = args[1..].to_vec();

    // Commands that need no session
    match command.as_str() {
        "analyze" => return commands::analyze(rest),
        "history" => return commands::history(rest),
        "help" | "--help" | "-h" => {
            commands::print_usage();
            return Ok(());
        }
        _ => {}
    }

    let provider = Arc::new(config.identity_client()?);
    let store = config.session_store()?;
    let session = SessionManager::spawn(provider, store);

    let result = match command.as_str() {
        "login" => commands::login(&session, &mut config, &rest).await,
        "register" => commands::register(&session, &mut config, &rest).await,
        "google" => commands::google(&session).await,
        "logout" => commands::logout(&session).await,
        "status" => commands::status(&session).await,
        "token" => commands::token(&session).await,
        "refresh" => commands::refresh(&session).await,
        other => {
            commands::print_usage();
            Err(anyhow::anyhow!("Unknown command: {}", other))
        }
    };

    info!("ChartLens shutting down");
    result
}
