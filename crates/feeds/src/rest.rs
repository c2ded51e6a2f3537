//! REST client for the Ethermine miner statistics endpoint.
//!
//! One GET per call, no retries. Callers decide how to surface failures.

use crate::error::FetchError;
use async_trait::async_trait;
use ethermine_core::{parse_rate, MinerStats, Shares, WorkerStats};
use hyper::ext::ReasonPhrase;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Host the API path is appended to.
pub const DEFAULT_BASE_URL: &str = "https://ethermine.org";

/// Upper bound for a single request, connect included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Anything that can produce a fresh statistics snapshot.
#[async_trait]
pub trait StatsSource: Send + Sync {
    /// Fetch the current snapshot.
    async fn fetch(&self) -> Result<MinerStats, FetchError>;
}

/// Ethermine HTTP client bound to a single miner endpoint.
pub struct EthermineClient {
    client: reqwest::Client,
    url: Url,
}

impl EthermineClient {
    /// Create a client for `{base_url}{api_path}`.
    pub fn new(base_url: &str, api_path: &str, timeout: Duration) -> Result<Self, FetchError> {
        let url = endpoint_url(base_url, api_path)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ethermine-watch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, url })
    }

    /// Replace the underlying HTTP client.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Full endpoint URL.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl StatsSource for EthermineClient {
    async fn fetch(&self) -> Result<MinerStats, FetchError> {
        let response = self.client.get(self.url.clone()).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let phrase = response
                .extensions()
                .get::<ReasonPhrase>()
                .map(|p| String::from_utf8_lossy(p.as_bytes()).into_owned());
            debug!(status = %status, reason = ?phrase, "Stats endpoint returned non-OK status");
            return Err(FetchError::from_status(status, phrase.as_deref()));
        }

        let body = response.bytes().await?;
        let stats = parse_miner_stats(&body)?;
        debug!(
            active_workers = stats.active_workers,
            workers = stats.workers.len(),
            "Fetched miner stats"
        );
        Ok(stats)
    }
}

/// Join host and path the way the pool documents its JSON API.
fn endpoint_url(base_url: &str, api_path: &str) -> Result<Url, FetchError> {
    let base = base_url.trim().trim_end_matches('/');
    let path = api_path.trim();
    let joined = if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    };

    let url = Url::parse(&joined)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            other
        ))),
    }
}

/// Parse a response body into a snapshot.
pub fn parse_miner_stats(body: &[u8]) -> Result<MinerStats, FetchError> {
    let response: MinerResponse = serde_json::from_slice(body)?;
    Ok(response.into())
}

// Response shape:
// {"address": "...", "hashRate": 1.0, "reportedHashRate": "1.0",
//  "minerStats": {"activeWorkers": 1, "validShares": 1, ...},
//  "workers": {"rig1": {"worker": "rig1", "hashrate": 1.0, ...}}}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinerResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    address: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    hash_rate: f64,
    // Kept raw so chat replies can show the upstream text
    #[serde(default)]
    reported_hash_rate: Value,
    miner_stats: MinerStatsBlock,
    #[serde(default)]
    workers: Option<BTreeMap<String, WorkerEntry>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MinerStatsBlock {
    #[serde(default, deserialize_with = "lenient_u64")]
    active_workers: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    valid_shares: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    stale_shares: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    invalid_shares: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkerEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    worker: String,
    // Lowercase upstream, unlike the top-level field
    #[serde(default, rename = "hashrate", deserialize_with = "lenient_f64")]
    hash_rate: f64,
    #[serde(default)]
    reported_hash_rate: Value,
    #[serde(default, deserialize_with = "lenient_u64")]
    valid_shares: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    stale_shares: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    invalid_shares: u64,
    #[serde(default, deserialize_with = "lenient_i64")]
    worker_last_submit_time: i64,
}

impl From<MinerResponse> for MinerStats {
    fn from(raw: MinerResponse) -> Self {
        let workers = raw
            .workers
            .unwrap_or_default()
            .into_iter()
            .map(|(name, entry)| {
                let worker = if entry.worker.is_empty() {
                    name.clone()
                } else {
                    entry.worker
                };
                let stats = WorkerStats {
                    worker,
                    hash_rate: entry.hash_rate,
                    reported_hash_rate: rate_from_value(&entry.reported_hash_rate),
                    reported_hash_rate_text: rate_text(entry.reported_hash_rate),
                    shares: Shares::new(
                        entry.valid_shares,
                        entry.stale_shares,
                        entry.invalid_shares,
                    ),
                    last_submit_time: entry.worker_last_submit_time,
                };
                (name, stats)
            })
            .collect();

        let block = raw.miner_stats;
        MinerStats {
            address: raw.address,
            hash_rate: raw.hash_rate,
            reported_hash_rate: rate_from_value(&raw.reported_hash_rate),
            reported_hash_rate_text: rate_text(raw.reported_hash_rate),
            active_workers: u32::try_from(block.active_workers).unwrap_or(u32::MAX),
            shares: Shares::new(block.valid_shares, block.stale_shares, block.invalid_shares),
            workers,
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(rate_from_value(&Value::deserialize(deserializer)?))
}

fn rate_from_value(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_rate(s),
        _ => 0.0,
    }
}

/// Upstream text of a rate field; `None` when absent or null.
fn rate_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v > 0.0).map(|v| v as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|v| v as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
