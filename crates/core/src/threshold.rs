//! Alert thresholds and the evaluation rule.

use crate::MinerStats;
use std::fmt;

/// Minimum acceptable values. Loaded once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertThresholds {
    /// Alert when fewer workers than this are active
    pub min_workers: u32,
    /// Alert when the reported hash rate drops below this
    pub min_hash_rate: u64,
}

impl AlertThresholds {
    pub fn new(min_workers: u32, min_hash_rate: u64) -> Self {
        Self {
            min_workers,
            min_hash_rate,
        }
    }
}

/// Warning produced when a threshold is breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertMessage {
    pub active_workers: u32,
    /// Whole part of the reported hash rate
    pub reported_hash_rate: u64,
}

impl fmt::Display for AlertMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "WARNING: \nActive Workers: {} \nReported HashRate: {}",
            self.active_workers, self.reported_hash_rate
        )
    }
}

/// Decide whether the snapshot warrants a warning.
///
/// Stateless: every call is judged on its own inputs, so a condition that
/// persists across polls fires on each of them.
pub fn evaluate(stats: &MinerStats, thresholds: &AlertThresholds) -> Option<AlertMessage> {
    let reported = stats.reported_hash_rate_whole();

    if stats.active_workers < thresholds.min_workers || reported < thresholds.min_hash_rate {
        Some(AlertMessage {
            active_workers: stats.active_workers,
            reported_hash_rate: reported,
        })
    } else {
        None
    }
}
