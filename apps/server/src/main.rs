//! Ethermine Watch Bot
//!
//! Polls the Ethermine miner API and alerts authorized Telegram users when
//! workers drop out or the reported hash rate sags.

mod config;

use clap::Parser;
use config::{load_settings_file, AppConfig, ConfigError};
use ethermine_alerts::{CommandRegistry, Notifier, TelegramBot};
use ethermine_feeds::{EthermineClient, FetchError, StatsSource};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{error, info, warn};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Ethermine Watch Bot CLI
#[derive(Parser, Debug)]
#[command(name = "ethermine-bot")]
#[command(about = "Telegram alerts for Ethermine workers", long_about = None)]
struct Args {
    /// Settings file in dotenv format
    #[arg(short, long, default_value = "settings.env")]
    settings: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Append logs to this file as well as stdout
    #[arg(long, default_value = "eth.log")]
    log_file: PathBuf,

    /// Log to stdout only
    #[arg(long, default_value_t = false)]
    no_log_file: bool,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid stats endpoint: {0}")]
    Endpoint(#[from] FetchError),

    #[error("Failed to open log file {}: {source}", path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set tracing subscriber: {0}")]
    Logging(String),
}

fn init_logging(level: &str, log_file: Option<&Path>) -> Result<(), StartupError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| StartupError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .with(file_layer)
        .try_init()
        .map_err(|e| StartupError::Logging(e.to_string()))
}

async fn run(args: Args) -> Result<(), StartupError> {
    if load_settings_file(&args.settings)? {
        info!("Loaded settings from {}", args.settings.display());
    } else {
        info!(
            "Settings file {} not found, using process environment",
            args.settings.display()
        );
    }

    let config = AppConfig::from_env()?;

    let client = EthermineClient::new(&config.api_base, &config.api_path, config.http_timeout)?;

    info!("Ethermine watch bot starting...");
    info!("  Endpoint host: {}", client.url().host_str().unwrap_or("-"));
    info!("  Min workers: {}", config.thresholds.min_workers);
    info!("  Min reported hash rate: {}", config.thresholds.min_hash_rate);
    info!("  Check interval: {}s", config.check_interval.as_secs());
    info!("  Authorized users: {}", config.allowed_users.len());

    let source: Arc<dyn StatsSource> = Arc::new(client);
    let bot = Arc::new(TelegramBot::new(&config.telegram_token));

    let mut registry = CommandRegistry::standard(
        source.clone(),
        config.thresholds,
        config.allowed_users.clone(),
    );
    match bot.username().await {
        Ok(username) => {
            info!("  Bot: @{}", username);
            registry = registry.with_bot_username(username);
        }
        Err(e) => warn!("Could not resolve bot username: {}", e),
    }

    if let Err(e) = bot.publish_commands(&registry).await {
        warn!("Failed to publish command menu: {}", e);
    }

    let notifier = Arc::new(Notifier::new(
        source,
        bot.clone(),
        config.thresholds,
        config.allowed_users.clone(),
    ));
    let check_handle = tokio::spawn(notifier.run(config.check_interval));

    info!("Press Ctrl+C to stop...");
    bot.run(Arc::new(registry)).await;

    warn!("Shutdown signal received");
    check_handle.abort();

    info!("Ethermine watch bot stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = (!args.no_log_file).then_some(args.log_file.as_path());
    if let Err(e) = init_logging(&args.log_level, log_file) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Startup failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["ethermine-bot"]);
        assert_eq!(args.settings, PathBuf::from("settings.env"));
        assert_eq!(args.log_level, "info");
        assert_eq!(args.log_file, PathBuf::from("eth.log"));
        assert!(!args.no_log_file);
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "ethermine-bot",
            "--settings",
            "/etc/eth/settings.env",
            "-l",
            "debug",
            "--no-log-file",
        ]);
        assert_eq!(args.settings, PathBuf::from("/etc/eth/settings.env"));
        assert_eq!(args.log_level, "debug");
        assert!(args.no_log_file);
    }
}
