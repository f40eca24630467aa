use serde::{Deserialize, Serialize};

/// A resolved, playable media item.
///
/// Items are produced by a resolver and never mutated afterwards; the queue
/// moves them around by value.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Item {
    /// Display title.
    pub title: String,
    /// Source locator handed to the stream acquirer (usually a URL).
    pub locator: String,
    /// Human readable duration label (for example `3:45`).
    pub duration: Option<String>,
    /// Author / channel label.
    pub author: Option<String>,
    /// Optional thumbnail locator.
    pub thumbnail: Option<String>,
}

impl Item {
    /// Build an item with only a title and locator.
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
            duration: None,
            author: None,
            thumbnail: None,
        }
    }
}

/// Playback controller state for one session.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    /// No current item and nothing in flight.
    #[default]
    Idle,
    /// Stream acquisition (or a scheduled retry) is in progress.
    Attempting,
    /// Stream handed to the transport and presumed live.
    Playing,
    /// End of item observed; deciding what comes next.
    Draining,
}

/// Reason why the transport stopped rendering an item.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PlaybackEndReason {
    /// Natural end of stream.
    Finished,
    /// Playback was stopped by something other than the controller.
    StoppedExternally,
    /// The transport failed mid-playback.
    Error,
}

/// Status notification emitted by a session controller.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// An item started playing.
    NowPlaying {
        item: Item,
        /// Items still waiting in the queue.
        remaining: usize,
        loop_enabled: bool,
        /// Retries needed before the stream could be opened.
        retries: u32,
    },
    /// The queue ran dry and loop mode is off.
    QueueEmpty,
    /// An item was appended to the queue.
    Added {
        item: Item,
        /// 1-based position in the pending queue.
        position: usize,
    },
    /// A blocked acquisition will be retried.
    Retrying {
        item: Item,
        attempt: u32,
        max_attempts: u32,
        wait_secs: u64,
    },
    /// An item was dropped after exhausting its retries.
    ErrorFinal { item: Item, attempts: u32 },
    /// An item was dropped after a non-retryable failure.
    ErrorGeneric { item: Item, message: String },
}

/// Discriminant of [`Notification`] without payload.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NowPlaying,
    QueueEmpty,
    Added,
    Retrying,
    ErrorFinal,
    ErrorGeneric,
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::NowPlaying { .. } => NotificationKind::NowPlaying,
            Notification::QueueEmpty => NotificationKind::QueueEmpty,
            Notification::Added { .. } => NotificationKind::Added,
            Notification::Retrying { .. } => NotificationKind::Retrying,
            Notification::ErrorFinal { .. } => NotificationKind::ErrorFinal,
            Notification::ErrorGeneric { .. } => NotificationKind::ErrorGeneric,
        }
    }

    /// `true` for notifications that report a failed item.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Notification::ErrorFinal { .. } | Notification::ErrorGeneric { .. }
        )
    }
}

/// Notification wrapped with its session id, as published to subscribers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionEvent {
    pub session_id: String,
    pub timestamp_ms: i64,
    pub notification: Notification,
}

/// Snapshot of one session's queue as shown to front-ends.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct QueueView {
    pub state: ControllerState,
    /// Item currently attempting or playing.
    pub current: Option<Item>,
    /// Pending items in queue order.
    pub pending: Vec<Item>,
    pub loop_enabled: bool,
    pub shuffle: bool,
    pub paused: bool,
}

/// Request body for enqueueing.
///
/// Exactly one of `query` (free text or a direct locator) or `item`
/// (already-resolved metadata) must be set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnqueueRequest {
    pub query: Option<String>,
    pub item: Option<Item>,
}

/// Response for a successful enqueue.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EnqueueResponse {
    pub item: Item,
    /// 1-based position in the pending queue.
    pub position: usize,
}

/// Request body for loop/shuffle toggles.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FlagRequest {
    pub enabled: bool,
}

/// Response for loop/shuffle/pause toggles.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FlagResponse {
    pub enabled: bool,
}

/// Response for clearing pending items.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ClearResponse {
    pub removed: usize,
}

/// Summary row for the session list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionSummary {
    pub id: String,
    pub state: ControllerState,
    pub now_playing: Option<String>,
    pub pending_len: usize,
    pub created_age_ms: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SessionsListResponse {
    pub sessions: Vec<SessionSummary>,
}

/// Liveness payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub timestamp_ms: i64,
    pub active_sessions: usize,
}
