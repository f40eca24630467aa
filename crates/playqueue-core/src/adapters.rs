//! Collaborator contracts: resolver, stream acquirer, transport, notifications.
//!
//! The controller only talks to the outside world through these traits.

use std::any::Any;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use playqueue_types::{Item, Notification};

use crate::controller::TransportSignals;
use crate::error::{AcquireError, ResolveError, TransportError};

/// Turns user input into playable items.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Free-text search returning the best match.
    async fn search(&self, query: &str) -> Result<Item, ResolveError>;
    /// Metadata lookup for a direct locator.
    async fn lookup(&self, locator: &str) -> Result<Item, ResolveError>;
}

/// Per-attempt information passed to the acquirer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttemptContext {
    /// Retries already made for this item (0 on the first attempt).
    pub attempt: u32,
    /// The controller abandons the attempt after this long.
    pub timeout: Duration,
}

/// Opens a live stream for a resolved item.
#[async_trait]
pub trait StreamAcquirer: Send + Sync {
    async fn acquire(
        &self,
        item: &Item,
        ctx: AttemptContext,
    ) -> Result<StreamHandle, AcquireError>;
}

/// An open, consumable media stream.
///
/// `guard` keeps whatever produces the bytes (a child process, a connection)
/// alive for as long as the handle is.
pub struct StreamHandle {
    label: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
    guard: Option<Box<dyn Any + Send>>,
}

impl StreamHandle {
    pub fn new(label: impl Into<String>, reader: impl AsyncRead + Send + 'static) -> Self {
        Self {
            label: label.into(),
            reader: Box::pin(reader),
            guard: None,
        }
    }

    pub fn with_guard(mut self, guard: impl Any + Send) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Split into the byte reader and its keep-alive guard.
    pub fn into_parts(self) -> (Pin<Box<dyn AsyncRead + Send>>, Option<Box<dyn Any + Send>>) {
        (self.reader, self.guard)
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("label", &self.label)
            .field("guarded", &self.guard.is_some())
            .finish()
    }
}

/// Renders streams for exactly one session.
///
/// End of playback is reported through the [`TransportSignals`] given to
/// [`Transport::play`], never by return value.
pub trait Transport: Send + Sync {
    fn play(&self, stream: StreamHandle, signals: TransportSignals) -> Result<(), TransportError>;
    /// End the current stream. The transport reports `stopped_externally` or
    /// nothing at all; the controller does not wait for either.
    fn force_stop(&self) -> Result<(), TransportError>;
    /// Toggle pause, returning the new paused state.
    fn pause_toggle(&self) -> Result<bool, TransportError>;
    /// Release the underlying connection. Idempotent.
    fn disconnect(&self);
    /// `true` once the connection is gone for good.
    fn is_destroyed(&self) -> bool;
}

/// Opens a transport for a new session.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, session_id: &str) -> Result<Arc<dyn Transport>, TransportError>;
}

/// Fire-and-forget receiver of controller notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, session_id: &str, notification: Notification);
}
