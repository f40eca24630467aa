//! In-process event bus for controller notifications.
//!
//! Provides a lightweight broadcast channel for SSE subscriptions.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::broadcast;

use playqueue_core::NotificationSink;
use playqueue_types::{Notification, SessionEvent};

const EVENT_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus with a bounded broadcast channel.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publish a notification; dropped when nobody is listening.
    pub fn publish(&self, session_id: &str, notification: Notification) {
        let _ = self.sender.send(SessionEvent {
            session_id: session_id.to_string(),
            timestamp_ms: now_ms(),
            notification,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, session_id: &str, notification: Notification) {
        self.publish(session_id, notification);
    }
}

pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
