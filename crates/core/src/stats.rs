//! Miner statistics snapshot as reported by the pool.

use std::collections::BTreeMap;

/// Share counters for a miner or a single worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shares {
    pub valid: u64,
    pub stale: u64,
    pub invalid: u64,
}

impl Shares {
    pub fn new(valid: u64, stale: u64, invalid: u64) -> Self {
        Self {
            valid,
            stale,
            invalid,
        }
    }
}

/// Per-worker statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkerStats {
    /// Worker identifier as configured on the rig
    pub worker: String,
    /// Effective hash rate measured by the pool
    pub hash_rate: f64,
    /// Hash rate reported by the worker
    pub reported_hash_rate: f64,
    /// Reported hash rate exactly as upstream sent it, if it was present
    pub reported_hash_rate_text: Option<String>,
    pub shares: Shares,
    /// Last share submission, Unix epoch seconds
    pub last_submit_time: i64,
}

/// Aggregate statistics for one mining address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MinerStats {
    /// Wallet address the statistics belong to
    pub address: String,
    /// Effective hash rate measured by the pool
    pub hash_rate: f64,
    /// Reported hash rate, 0 when upstream sent something unparsable
    pub reported_hash_rate: f64,
    /// Reported hash rate exactly as upstream sent it, if it was present
    pub reported_hash_rate_text: Option<String>,
    /// Number of workers the pool currently considers active
    pub active_workers: u32,
    pub shares: Shares,
    /// Workers keyed by name
    pub workers: BTreeMap<String, WorkerStats>,
}

impl MinerStats {
    /// Whole part of the reported hash rate.
    ///
    /// Negative and non-finite values collapse to 0.
    pub fn reported_hash_rate_whole(&self) -> u64 {
        whole(self.reported_hash_rate)
    }

    /// Reported hash rate for display: upstream text when present.
    pub fn reported_hash_rate_display(&self) -> String {
        display_rate(self.reported_hash_rate_text.as_deref(), self.reported_hash_rate)
    }
}

impl WorkerStats {
    /// Reported hash rate for display: upstream text when present.
    pub fn reported_hash_rate_display(&self) -> String {
        display_rate(self.reported_hash_rate_text.as_deref(), self.reported_hash_rate)
    }
}

fn display_rate(text: Option<&str>, parsed: f64) -> String {
    match text {
        Some(text) => text.to_string(),
        None => parsed.to_string(),
    }
}

/// Parse a rate value that upstream may send as a decimal string.
/// Anything that doesn't parse to a finite number yields 0.
pub fn parse_rate(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

fn whole(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.trunc() as u64
    } else {
        0
    }
}
