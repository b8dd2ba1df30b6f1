// src/services/notifier.rs

//! Outbound notification seam.
//!
//! The crawler only produces events; delivering them (chat bot, mail,
//! console) belongs to the host. Two stock implementations are provided:
//! [`LogNotifier`] writes formatted lines to the log, [`ChannelNotifier`]
//! forwards [`Notification`]s to whoever holds the receiving end.

use tokio::sync::mpsc;

use crate::models::{Filter, Listing};

/// Receiver of match and admin notifications.
///
/// Calls are fire-and-forget: delivery failures are the implementor's concern.
pub trait Notifier: Send + Sync {
    /// A listing matched a filter.
    fn notify_subscribers(&self, filter: &Filter, listing: &Listing);

    /// Operator-facing message, e.g. an error threshold alert.
    fn notify_admins(&self, message: &str);
}

/// Logs notifications using a listing template.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    template: String,
}

impl LogNotifier {
    /// See [`Listing::format`] for the placeholders.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify_subscribers(&self, filter: &Filter, listing: &Listing) {
        log::info!("MATCH {}", listing.format(&filter.title, &self.template));
    }

    fn notify_admins(&self, message: &str) {
        log::warn!("ADMIN {}", message);
    }
}

/// Event emitted by [`ChannelNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Match { filter: Filter, listing: Listing },
    Admin(String),
}

/// Forwards notifications over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }

    /// Create a notifier together with its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            log::warn!("Notification dropped: receiver closed");
        }
    }
}

impl Notifier for ChannelNotifier {
    fn notify_subscribers(&self, filter: &Filter, listing: &Listing) {
        self.send(Notification::Match {
            filter: filter.clone(),
            listing: listing.clone(),
        });
    }

    fn notify_admins(&self, message: &str) {
        self.send(Notification::Admin(message.to_string()));
    }
}
