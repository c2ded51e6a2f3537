//! Periodic worker check and alert broadcast.

use crate::format::{all_clear, unreachable_notice};
use crate::telegram::TelegramError;
use async_trait::async_trait;
use ethermine_core::{evaluate, AlertMessage, AlertThresholds, AuthorizedUsers, MinerStats};
use ethermine_feeds::{FetchError, StatsSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Outbound text delivery to a chat.
#[async_trait]
pub trait ChatSender: Send + Sync {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

/// Result of one fetch-and-evaluate pass.
#[derive(Debug)]
pub enum CheckOutcome {
    /// A threshold was breached.
    Alert(AlertMessage),
    /// Both thresholds were met.
    Healthy(MinerStats),
    /// The pool API could not be reached.
    Unreachable(FetchError),
}

impl CheckOutcome {
    /// Text to push to every authorized user, if any.
    pub fn broadcast_text(&self) -> Option<String> {
        match self {
            CheckOutcome::Alert(alert) => Some(alert.to_string()),
            CheckOutcome::Healthy(_) => None,
            CheckOutcome::Unreachable(err) => Some(unreachable_notice(err)),
        }
    }

    /// Text to reply with when the check was requested from chat.
    pub fn reply_text(&self) -> String {
        match self {
            CheckOutcome::Healthy(stats) => all_clear(stats),
            CheckOutcome::Alert(alert) => alert.to_string(),
            CheckOutcome::Unreachable(err) => unreachable_notice(err),
        }
    }
}

/// Fetch once and evaluate against `thresholds`.
pub async fn run_check(source: &dyn StatsSource, thresholds: &AlertThresholds) -> CheckOutcome {
    match source.fetch().await {
        Ok(stats) => match evaluate(&stats, thresholds) {
            Some(alert) => CheckOutcome::Alert(alert),
            None => CheckOutcome::Healthy(stats),
        },
        Err(e) => CheckOutcome::Unreachable(e),
    }
}

/// Pushes check results to all authorized users.
pub struct Notifier {
    source: Arc<dyn StatsSource>,
    sender: Arc<dyn ChatSender>,
    thresholds: AlertThresholds,
    users: AuthorizedUsers,
}

impl Notifier {
    pub fn new(
        source: Arc<dyn StatsSource>,
        sender: Arc<dyn ChatSender>,
        thresholds: AlertThresholds,
        users: AuthorizedUsers,
    ) -> Self {
        Self {
            source,
            sender,
            thresholds,
            users,
        }
    }

    /// Send `text` to every authorized user. Failures are logged and skipped.
    /// Returns the number of successful deliveries.
    pub async fn broadcast(&self, text: &str) -> u32 {
        let mut sent = 0u32;
        for chat_id in self.users.iter() {
            match self.sender.send_text(chat_id, text).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(chat_id = chat_id, error = %e, "Failed to deliver notification");
                }
            }
        }
        sent
    }

    /// One scheduled pass: check, then broadcast anything worth telling.
    pub async fn tick(&self) -> CheckOutcome {
        let outcome = run_check(self.source.as_ref(), &self.thresholds).await;

        match &outcome {
            CheckOutcome::Healthy(stats) => {
                debug!(
                    active_workers = stats.active_workers,
                    reported_hash_rate = stats.reported_hash_rate,
                    "Worker check passed"
                );
            }
            CheckOutcome::Alert(alert) => {
                info!(
                    active_workers = alert.active_workers,
                    reported_hash_rate = alert.reported_hash_rate,
                    "Threshold breached, alerting"
                );
            }
            CheckOutcome::Unreachable(err) => {
                warn!(error = %err, "Stats endpoint unreachable");
            }
        }

        if let Some(text) = outcome.broadcast_text() {
            let sent = self.broadcast(&text).await;
            info!(sent = sent, recipients = self.users.len(), "Notification sent");
        }

        outcome
    }

    /// Run `tick` every `period`, first one a full period after start.
    pub async fn run(self: Arc<Self>, period: Duration) {
        info!(period_secs = period.as_secs(), "Starting worker check loop");

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ethermine_core::parse_rate;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns a fixed snapshot, or a fixed HTTP failure.
    pub(crate) struct FakeSource {
        pub stats: Option<MinerStats>,
        pub calls: AtomicUsize,
    }

    impl FakeSource {
        pub fn ok(active_workers: u32, reported: &str) -> Self {
            Self {
                stats: Some(MinerStats {
                    address: "0xabc".to_string(),
                    active_workers,
                    reported_hash_rate: parse_rate(reported),
                    ..Default::default()
                }),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn unavailable() -> Self {
            Self {
                stats: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StatsSource for FakeSource {
        async fn fetch(&self) -> Result<MinerStats, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.stats.clone().ok_or_else(|| FetchError::Status {
                code: 503,
                reason: "Service Unavailable".to_string(),
            })
        }
    }

    /// Records deliveries; fails for chat ids listed in `reject`.
    #[derive(Default)]
    pub(crate) struct RecordingSender {
        pub sent: Mutex<Vec<(i64, String)>>,
        pub reject: Vec<i64>,
    }

    #[async_trait]
    impl ChatSender for RecordingSender {
        async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
            if self.reject.contains(&chat_id) {
                return Err(TelegramError::ChatUnavailable(
                    chat_id,
                    "bot was blocked by the user".to_string(),
                ));
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    fn notifier(source: FakeSource, sender: Arc<RecordingSender>) -> Notifier {
        Notifier::new(
            Arc::new(source),
            sender,
            AlertThresholds::new(3, 1000),
            AuthorizedUsers::new([1, 2]),
        )
    }

    #[tokio::test]
    async fn test_tick_broadcasts_alert_to_every_user() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = notifier(FakeSource::ok(2, "1200.5"), sender.clone());

        let outcome = notifier.tick().await;
        assert!(matches!(outcome, CheckOutcome::Alert(_)));

        let expected = "WARNING: \nActive Workers: 2 \nReported HashRate: 1200".to_string();
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![(1, expected.clone()), (2, expected)]
        );
    }

    #[tokio::test]
    async fn test_tick_silent_when_healthy() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = notifier(FakeSource::ok(3, "1500.0"), sender.clone());

        let outcome = notifier.tick().await;
        assert!(matches!(outcome, CheckOutcome::Healthy(_)));
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_tick_broadcasts_unreachable_notice() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = notifier(FakeSource::unavailable(), sender.clone());

        notifier.tick().await;

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        for (_, text) in sent.iter() {
            assert_eq!(text, "Unable to reach Ethermine: Service Unavailable");
        }
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_broadcast() {
        let sender = Arc::new(RecordingSender {
            reject: vec![1],
            ..Default::default()
        });
        let notifier = notifier(FakeSource::ok(0, "0"), sender.clone());

        let sent = notifier.broadcast("hello").await;
        assert_eq!(sent, 1);
        assert_eq!(
            *sender.sent.lock().unwrap(),
            vec![(2, "hello".to_string())]
        );
    }

    #[tokio::test]
    async fn test_sustained_breach_alerts_every_tick() {
        let sender = Arc::new(RecordingSender::default());
        let notifier = notifier(FakeSource::ok(1, "10"), sender.clone());

        notifier.tick().await;
        notifier.tick().await;
        notifier.tick().await;

        assert_eq!(sender.sent.lock().unwrap().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_one_period_before_first_check() {
        let sender = Arc::new(RecordingSender::default());
        let source = Arc::new(FakeSource::ok(1, "10"));
        let notifier = Arc::new(Notifier::new(
            source.clone(),
            sender.clone(),
            AlertThresholds::new(3, 1000),
            AuthorizedUsers::new([1]),
        ));

        let period = Duration::from_secs(60);
        let handle = tokio::spawn(notifier.run(period));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[test]
    fn test_reply_text_for_each_outcome() {
        let healthy = CheckOutcome::Healthy(MinerStats {
            active_workers: 4,
            reported_hash_rate: 2000.9,
            ..Default::default()
        });
        assert_eq!(
            healthy.reply_text(),
            "OK: \nActive Workers: 4 \nReported HashRate: 2000"
        );
        assert_eq!(healthy.broadcast_text(), None);

        let down = CheckOutcome::Unreachable(FetchError::Transport("request timed out".into()));
        assert_eq!(
            down.reply_text(),
            "Unable to reach Ethermine: request timed out"
        );
    }
}
