//! Shared per-session status snapshot.
//!
//! The controller task republishes this after every message so the registry
//! can answer list/health queries without a round trip to the actor.

use std::sync::{Arc, Mutex};

use playqueue_types::ControllerState;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: ControllerState,
    /// Title of the item attempting or playing.
    pub now_playing: Option<String>,
    pub pending_len: usize,
    pub paused: bool,
}

#[derive(Clone, Default)]
pub struct StatusStore {
    inner: Arc<Mutex<SessionStatus>>,
}

impl StatusStore {
    pub fn snapshot(&self) -> SessionStatus {
        self.inner
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|err| err.into_inner().clone())
    }

    pub(crate) fn publish(&self, status: SessionStatus) {
        let mut guard = self.inner.lock().unwrap_or_else(|err| err.into_inner());
        *guard = status;
    }
}
