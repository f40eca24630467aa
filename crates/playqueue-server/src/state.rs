//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use playqueue_core::PlaybackService;

use crate::events::EventBus;

pub struct AppState {
    pub service: Arc<PlaybackService>,
    pub events: EventBus,
    /// Process start, for the health endpoint's uptime.
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<PlaybackService>, events: EventBus) -> Self {
        Self {
            service,
            events,
            started_at: Instant::now(),
        }
    }
}
