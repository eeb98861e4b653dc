//! Outbound notifications
//!
//! Every submission produces zero or more `Text`/`ToolEvent` notifications and
//! exactly one terminal notification (`Done`, `Stopped` or `Error`).

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::error::ErrorKind;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// User-visible model text
    Text { message: String },

    /// A tool is about to run
    ToolEvent { name: String, args: serde_json::Value },

    /// The exchange completed
    Done,

    /// Generation stopped by the user
    Stopped,

    /// The exchange failed
    Error { kind: ErrorKind, detail: String },
}

impl Notification {
    pub fn text(message: impl Into<String>) -> Self {
        Notification::Text {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Notification::Done | Notification::Stopped | Notification::Error { .. }
        )
    }
}

/// Receiver of session notifications
pub trait Observer: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl Observer for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}

/// Observer that records everything it is sent
#[derive(Debug, Default)]
pub struct NotificationLog {
    entries: Mutex<Vec<Notification>>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Text messages, in order
    pub fn texts(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Text { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    /// The terminal notification, if one arrived
    pub fn terminal(&self) -> Option<Notification> {
        self.entries().into_iter().find(Notification::is_terminal)
    }
}

impl Observer for NotificationLog {
    fn notify(&self, notification: Notification) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(Notification::Error {
            kind: ErrorKind::Network,
            detail: "offline".into(),
        })
        .unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["kind"], "network");

        let text = serde_json::to_value(Notification::text("hi")).unwrap();
        assert_eq!(text, serde_json::json!({"type": "text", "message": "hi"}));
    }

    #[test]
    fn test_log_records_in_order() {
        let log = NotificationLog::new();
        log.notify(Notification::text("a"));
        log.notify(Notification::text("b"));
        log.notify(Notification::Done);

        assert_eq!(log.texts(), vec!["a", "b"]);
        assert_eq!(log.terminal(), Some(Notification::Done));
    }

    #[tokio::test]
    async fn test_channel_observer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.notify(Notification::Stopped);
        assert_eq!(rx.recv().await, Some(Notification::Stopped));
    }
}
