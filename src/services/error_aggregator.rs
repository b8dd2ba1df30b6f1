// src/services/error_aggregator.rs

//! Trailing-window error counting with threshold alerts.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::models::{AlertConfig, ErrorKind, ErrorRecord};
use crate::services::Notifier;

/// Collects classified failures and alerts admins once they pile up.
///
/// Shared by every fetcher and site worker. Recording is cheap; the
/// threshold check happens in [`maybe_alert`](Self::maybe_alert), which the
/// scheduler calls after each filter.
pub struct ErrorAggregator {
    records: Mutex<Vec<ErrorRecord>>,
    notifier: Arc<dyn Notifier>,
    threshold: usize,
    window: Duration,
}

impl ErrorAggregator {
    pub fn new(notifier: Arc<dyn Notifier>, config: &AlertConfig) -> Self {
        Self::with_limits(notifier, config.threshold, config.window())
    }

    pub fn with_limits(notifier: Arc<dyn Notifier>, threshold: usize, window: Duration) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            notifier,
            threshold,
            window,
        }
    }

    /// Append one failure of `kind`.
    pub fn record(&self, kind: ErrorKind) {
        log::debug!("Recorded {} error", kind);
        self.lock().push(ErrorRecord {
            timestamp: Instant::now(),
            kind,
        });
    }

    /// Failures of `kind` inside the current window.
    pub fn count(&self, kind: ErrorKind) -> usize {
        let mut records = self.lock();
        self.prune(&mut records);
        records.iter().filter(|r| r.kind == kind).count()
    }

    /// Alert admins and start over if the window holds `threshold` or more
    /// failures. Returns whether an alert was sent.
    pub fn maybe_alert(&self) -> bool {
        let mut records = self.lock();
        self.prune(&mut records);

        if records.len() < self.threshold {
            return false;
        }

        let message = self.summary(&records);
        log::info!("Sending admin notification: {}", message);
        // Dispatch under the lock so nothing recorded meanwhile gets cleared unseen.
        self.notifier.notify_admins(&message);
        records.clear();
        true
    }

    fn summary(&self, records: &[ErrorRecord]) -> String {
        let mut lines = vec![format!(
            "There were {} errors in the last {} minutes:",
            records.len(),
            self.window.as_secs() / 60
        )];
        lines.extend(ErrorKind::ALL.iter().map(|kind| {
            let count = records.iter().filter(|r| r.kind == *kind).count();
            format!("{}: {}", kind, count)
        }));
        lines.join("\n")
    }

    fn prune(&self, records: &mut Vec<ErrorRecord>) {
        let now = Instant::now();
        records.retain(|r| now.duration_since(r.timestamp) < self.window);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ErrorRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ChannelNotifier, Notification};

    fn aggregator() -> (
        ErrorAggregator,
        tokio::sync::mpsc::UnboundedReceiver<Notification>,
    ) {
        let (notifier, rx) = ChannelNotifier::channel();
        let errors = ErrorAggregator::new(Arc::new(notifier), &AlertConfig::default());
        (errors, rx)
    }

    #[tokio::test]
    async fn test_threshold_alert_lists_all_kinds() {
        let (errors, mut rx) = aggregator();

        errors.record(ErrorKind::ParseLink);
        assert!(!errors.maybe_alert());
        errors.record(ErrorKind::ParseLink);
        assert!(errors.maybe_alert());

        let Notification::Admin(message) = rx.try_recv().unwrap() else {
            panic!("expected admin notification");
        };
        assert!(message.starts_with("There were 2 errors in the last 60 minutes:"));
        assert!(message.contains("parse-link: 2"));
        for kind in ErrorKind::ALL.iter().filter(|k| **k != ErrorKind::ParseLink) {
            assert!(message.contains(&format!("{}: 0", kind)));
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_alert_starts_fresh_window() {
        let (errors, mut rx) = aggregator();
        errors.record(ErrorKind::ParseLink);
        errors.record(ErrorKind::ParseLink);
        assert!(errors.maybe_alert());
        let _ = rx.try_recv();

        errors.record(ErrorKind::ParseLink);
        assert_eq!(errors.count(ErrorKind::ParseLink), 1);
        assert!(!errors.maybe_alert());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_old_records_fall_out_of_window() {
        let (errors, _rx) = aggregator();
        errors.record(ErrorKind::HttpRequest);
        tokio::time::advance(Duration::from_secs(3601)).await;
        errors.record(ErrorKind::HttpRequest);

        assert_eq!(errors.count(ErrorKind::HttpRequest), 1);
        assert!(!errors.maybe_alert());
    }
}
