//! Application configuration.
//!
//! Settings come from a dotenv file plus the process environment, using the
//! key names existing deployments already have in `settings.env`.

use ethermine_core::{AlertThresholds, AuthorizedUsers};
use ethermine_feeds::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const KEY_TOKEN: &str = "TELEGRAMTOKEN";
pub const KEY_API_URL: &str = "APIURL";
pub const KEY_MIN_WORKERS: &str = "N_WORKERS";
pub const KEY_MIN_HASH_RATE: &str = "REPORTEDHASH";
pub const KEY_INTERVAL_MINUTES: &str = "WCHECKINGMINUTES";
pub const KEY_ALLOWED_USERS: &str = "ALLOWEDUSERID";
pub const KEY_API_BASE: &str = "API_BASE";
pub const KEY_HTTP_TIMEOUT: &str = "HTTP_TIMEOUT_SECS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read settings file {}: {source}", path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}

/// Application configuration. Built once at startup, read-only afterwards.
#[derive(Clone)]
pub struct AppConfig {
    /// Telegram bot token from BotFather.
    pub telegram_token: String,
    /// API host, the path is appended to it.
    pub api_base: String,
    /// Miner endpoint path from the Ethermine JSON API section.
    pub api_path: String,
    /// Alert thresholds.
    pub thresholds: AlertThresholds,
    /// Time between scheduled checks.
    pub check_interval: Duration,
    /// Chat ids allowed to talk to the bot and receive alerts.
    pub allowed_users: AuthorizedUsers,
    /// Timeout for a single stats request.
    pub http_timeout: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("telegram_token", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("api_path", &self.api_path)
            .field("thresholds", &self.thresholds)
            .field("check_interval", &self.check_interval)
            .field("allowed_users", &self.allowed_users)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which maps a key to its raw value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_token = required(&lookup, KEY_TOKEN)?;
        let api_path = required(&lookup, KEY_API_URL)?;
        let min_workers: u32 = parse_required(&lookup, KEY_MIN_WORKERS)?;
        let min_hash_rate: u64 = parse_required(&lookup, KEY_MIN_HASH_RATE)?;

        let minutes: u64 = parse_required(&lookup, KEY_INTERVAL_MINUTES)?;
        if minutes == 0 {
            return Err(invalid(KEY_INTERVAL_MINUTES, "0", "must be at least 1 minute"));
        }

        let raw_users = required(&lookup, KEY_ALLOWED_USERS)?;
        let user_ids = parse_user_ids(&raw_users)
            .map_err(|reason| invalid(KEY_ALLOWED_USERS, &raw_users, reason))?;
        if user_ids.is_empty() {
            return Err(invalid(
                KEY_ALLOWED_USERS,
                &raw_users,
                "at least one user id is required",
            ));
        }

        let api_base = optional(&lookup, KEY_API_BASE).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let http_timeout = match optional(&lookup, KEY_HTTP_TIMEOUT) {
            Some(raw) => {
                let secs: u64 = parse_value(KEY_HTTP_TIMEOUT, &raw)?;
                if secs == 0 {
                    return Err(invalid(KEY_HTTP_TIMEOUT, &raw, "must be at least 1 second"));
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self {
            telegram_token,
            api_base,
            api_path,
            thresholds: AlertThresholds::new(min_workers, min_hash_rate),
            check_interval: Duration::from_secs(minutes.saturating_mul(60)),
            allowed_users: AuthorizedUsers::new(user_ids),
            http_timeout,
        })
    }
}

/// Load a dotenv settings file into the process environment.
///
/// Variables already set in the environment win. A missing file is not an
/// error; returns whether the file was found.
pub fn load_settings_file(path: &Path) -> Result<bool, ConfigError> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(source) => Err(ConfigError::Settings {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or(ConfigError::Missing(key))
}

fn parse_required<F, T>(lookup: &F, key: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw = required(lookup, key)?;
    parse_value(key, &raw)
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| invalid(key, raw, e.to_string()))
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Parse `123,456` or `[123, 456]`.
fn parse_user_ids(raw: &str) -> Result<Vec<i64>, String> {
    let trimmed = raw.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed);

    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|e| format!("'{}' is not a chat id: {}", s, e))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn base_settings() -> HashMap<&'static str, String> {
        HashMap::from([
            (KEY_TOKEN, "123:abc".to_string()),
            (KEY_API_URL, "/api/miner_new/0xabc".to_string()),
            (KEY_MIN_WORKERS, "3".to_string()),
            (KEY_MIN_HASH_RATE, "1000".to_string()),
            (KEY_INTERVAL_MINUTES, "30".to_string()),
            (KEY_ALLOWED_USERS, "111,222".to_string()),
        ])
    }

    fn load(settings: &HashMap<&'static str, String>) -> Result<AppConfig, ConfigError> {
        AppConfig::from_lookup(|key| settings.get(key).cloned())
    }

    #[test]
    fn test_full_config() {
        let config = load(&base_settings()).unwrap();
        assert_eq!(config.telegram_token, "123:abc");
        assert_eq!(config.api_path, "/api/miner_new/0xabc");
        assert_eq!(config.api_base, DEFAULT_BASE_URL);
        assert_eq!(config.thresholds, AlertThresholds::new(3, 1000));
        assert_eq!(config.check_interval, Duration::from_secs(30 * 60));
        assert_eq!(config.allowed_users, AuthorizedUsers::new([111, 222]));
        assert_eq!(config.http_timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_missing_key() {
        for key in [
            KEY_TOKEN,
            KEY_API_URL,
            KEY_MIN_WORKERS,
            KEY_MIN_HASH_RATE,
            KEY_INTERVAL_MINUTES,
            KEY_ALLOWED_USERS,
        ] {
            let mut settings = base_settings();
            settings.remove(key);
            match load(&settings) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, key),
                other => panic!("expected missing {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut settings = base_settings();
        settings.insert(KEY_TOKEN, "   ".to_string());
        assert!(matches!(load(&settings), Err(ConfigError::Missing(KEY_TOKEN))));
    }

    #[test]
    fn test_non_numeric_threshold() {
        let mut settings = base_settings();
        settings.insert(KEY_MIN_WORKERS, "three".to_string());
        assert!(matches!(
            load(&settings),
            Err(ConfigError::Invalid {
                key: KEY_MIN_WORKERS,
                ..
            })
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut settings = base_settings();
        settings.insert(KEY_INTERVAL_MINUTES, "0".to_string());
        assert!(matches!(
            load(&settings),
            Err(ConfigError::Invalid {
                key: KEY_INTERVAL_MINUTES,
                ..
            })
        ));
    }

    #[test]
    fn test_user_id_formats() {
        assert_eq!(parse_user_ids("1,2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_user_ids("[1, -2 ,3]").unwrap(), vec![1, -2, 3]);
        assert_eq!(parse_user_ids(" 42 ").unwrap(), vec![42]);
        assert!(parse_user_ids("1,abc").is_err());
    }

    #[test]
    fn test_empty_user_list_rejected() {
        let mut settings = base_settings();
        settings.insert(KEY_ALLOWED_USERS, "[]".to_string());
        assert!(matches!(
            load(&settings),
            Err(ConfigError::Invalid {
                key: KEY_ALLOWED_USERS,
                ..
            })
        ));
    }

    #[test]
    fn test_optional_overrides() {
        let mut settings = base_settings();
        settings.insert(KEY_API_BASE, "http://localhost:8080".to_string());
        settings.insert(KEY_HTTP_TIMEOUT, "3".to_string());
        let config = load(&settings).unwrap();
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.http_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = load(&base_settings()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("123:abc"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_missing_settings_file_is_not_an_error() {
        let loaded = load_settings_file(Path::new("/nonexistent/settings.env")).unwrap();
        assert!(!loaded);
    }
}
