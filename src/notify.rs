//! User-visible notification dispatch.
//!
//! The synchronizer reports session-level events (today: sync ending) through
//! a generic, fire-and-forget dispatch seam so hosts can route them to a
//! toast, a status bar, or nowhere at all.

use log::Level;

/// A user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

/// The notification raised when direct edits end builder sync.
pub fn composition_ended() -> Notification {
    Notification {
        level: Level::Info,
        message: "Builder sync ended: the query text was edited directly.".to_string(),
    }
}

/// Fire-and-forget notification sink. No return value is consumed.
pub trait Notifier {
    fn notify(&mut self, notification: Notification);
}

/// Default sink: forwards notifications to the `log` facade.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notification: Notification) {
        log::log!(notification.level, "{}", notification.message);
    }
}

/// Test sink that records every notification it receives.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    pub received: Vec<Notification>,
}

impl Notifier for CollectingNotifier {
    fn notify(&mut self, notification: Notification) {
        self.received.push(notification);
    }
}
