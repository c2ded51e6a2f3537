//! Chat message formatting.

use chrono::{DateTime, Local, TimeZone};
use ethermine_core::{MinerStats, WorkerStats};
use ethermine_feeds::FetchError;
use std::fmt::Display;

/// Static command list sent in reply to `/help`.
pub const HELP_TEXT: &str = "Command List\n\
     /status - general info\n\
     /workers - list workers\n\
     /check - run the worker check now\n\
     /ping - are you alive?\n\
     /help - print this :D\n\
     NOTE: this bot automatically checks for workers crash!";

/// Liveness reply.
pub const PONG: &str = "pong";

/// Reply used when the pool reports no workers at all.
pub const NO_WORKERS: &str = "No workers reporting";

/// Notice sent when the pool API could not be reached.
pub fn unreachable_notice(err: &FetchError) -> String {
    format!("Unable to reach Ethermine: {}", err.reason())
}

/// Summary for `/status`.
pub fn status_report(stats: &MinerStats) -> String {
    format!(
        "Addr: {}\nHash: {}\nreportedHash: {}\nnWorkers: {}\nShares (v/s/i): {}/{}/{}",
        stats.address,
        stats.hash_rate,
        stats.reported_hash_rate_display(),
        stats.active_workers,
        stats.shares.valid,
        stats.shares.stale,
        stats.shares.invalid
    )
}

/// Reply for a manual check that found nothing wrong.
pub fn all_clear(stats: &MinerStats) -> String {
    format!(
        "OK: \nActive Workers: {} \nReported HashRate: {}",
        stats.active_workers,
        stats.reported_hash_rate_whole()
    )
}

/// Per-worker listing for `/workers`, timestamps in local time.
pub fn workers_report(stats: &MinerStats) -> String {
    workers_report_in(stats, &Local)
}

/// Per-worker listing with timestamps rendered in `tz`.
pub fn workers_report_in<Tz>(stats: &MinerStats, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if stats.workers.is_empty() {
        return NO_WORKERS.to_string();
    }

    let mut out = String::new();
    for worker in stats.workers.values() {
        out.push_str(&worker_block(worker, tz));
    }
    out
}

fn worker_block<Tz>(worker: &WorkerStats, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "Worker {}\nHash: {}\nreportedHash: {}\nShares (v/s/i): {}/{}/{}\nLastShare: {}\n\n",
        worker.worker,
        worker.hash_rate,
        worker.reported_hash_rate_display(),
        worker.shares.valid,
        worker.shares.stale,
        worker.shares.invalid,
        last_share(worker.last_submit_time, tz)
    )
}

fn last_share<Tz>(epoch_secs: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::from_timestamp(epoch_secs, 0) {
        Some(utc) => utc.with_timezone(tz).format("%d/%m/%y %H:%M").to_string(),
        None => "unknown".to_string(),
    }
}
