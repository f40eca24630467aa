//! Notification sinks that do not depend on a front-end.

use std::sync::Arc;

use playqueue_types::Notification;

use crate::adapters::NotificationSink;

/// Writes every notification to the tracing log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, session_id: &str, notification: Notification) {
        match &notification {
            Notification::NowPlaying {
                item,
                remaining,
                retries,
                ..
            } => tracing::info!(
                session_id = %session_id,
                title = %item.title,
                remaining = *remaining,
                retries = *retries,
                "now playing"
            ),
            Notification::QueueEmpty => {
                tracing::info!(session_id = %session_id, "queue finished")
            }
            Notification::Added { item, position } => tracing::info!(
                session_id = %session_id,
                title = %item.title,
                position = *position,
                "added to queue"
            ),
            Notification::Retrying {
                item,
                attempt,
                max_attempts,
                wait_secs,
            } => tracing::warn!(
                session_id = %session_id,
                title = %item.title,
                attempt = *attempt,
                max_attempts = *max_attempts,
                wait_secs = *wait_secs,
                "retrying blocked stream"
            ),
            Notification::ErrorFinal { item, attempts } => tracing::warn!(
                session_id = %session_id,
                title = %item.title,
                attempts = *attempts,
                "giving up on item"
            ),
            Notification::ErrorGeneric { item, message } => tracing::warn!(
                session_id = %session_id,
                title = %item.title,
                error = %message,
                "item failed"
            ),
        }
    }
}

/// Forwards each notification to several sinks in order.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, session_id: &str, notification: Notification) {
        let Some((last, rest)) = self.sinks.split_last() else {
            return;
        };
        for sink in rest {
            sink.notify(session_id, notification.clone());
        }
        last.notify(session_id, notification);
    }
}
