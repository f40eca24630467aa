//! In-memory registry of per-session controllers.
//!
//! A session is created lazily on the first enqueue and lives until it is
//! disconnected or its transport is found destroyed by the reaper.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use playqueue_types::SessionSummary;

use crate::adapters::{NotificationSink, StreamAcquirer, Transport, TransportFactory};
use crate::controller::{ControllerDeps, ControllerHandle};
use crate::error::ServiceError;
use crate::policy::PlaybackPolicy;

/// One live session: its controller and the transport it plays into.
pub struct Session {
    pub id: String,
    pub controller: ControllerHandle,
    pub transport: Arc<dyn Transport>,
    pub created_at: Instant,
}

impl Session {
    pub fn summary(&self) -> SessionSummary {
        let status = self.controller.status();
        SessionSummary {
            id: self.id.clone(),
            state: status.state,
            now_playing: status.now_playing,
            pending_len: status.pending_len,
            created_age_ms: self.created_at.elapsed().as_millis() as u64,
        }
    }
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    factory: Arc<dyn TransportFactory>,
    acquirer: Arc<dyn StreamAcquirer>,
    sink: Arc<dyn NotificationSink>,
    policy: PlaybackPolicy,
}

impl SessionRegistry {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        acquirer: Arc<dyn StreamAcquirer>,
        sink: Arc<dyn NotificationSink>,
        policy: PlaybackPolicy,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            factory,
            acquirer,
            sink,
            policy,
        }
    }

    /// Return the live session for `id`, connecting a new transport if needed.
    pub fn get_or_create(&self, id: &str) -> Result<Arc<Session>, ServiceError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
        if let Some(existing) = sessions.get(id) {
            if !existing.transport.is_destroyed() && existing.controller.is_running() {
                return Ok(existing.clone());
            }
            if let Some(stale) = sessions.remove(id) {
                tracing::info!(session_id = %id, "replacing dead session");
                tokio::spawn(close_session(stale));
            }
        }

        let transport = self.factory.connect(id)?;
        let controller = ControllerHandle::spawn(
            id,
            self.policy.clone(),
            ControllerDeps {
                acquirer: self.acquirer.clone(),
                transport: transport.clone(),
                sink: self.sink.clone(),
            },
        );
        let session = Arc::new(Session {
            id: id.to_string(),
            controller,
            transport,
            created_at: Instant::now(),
        });
        sessions.insert(id.to_string(), session.clone());
        tracing::info!(session_id = %id, "session created");
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        let sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
        sessions.get(id).cloned()
    }

    /// Tear down a session. Returns `false` if it did not exist.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
            sessions.remove(id)
        };
        match removed {
            Some(session) => {
                close_session(session).await;
                tracing::info!(session_id = %id, "session removed");
                true
            }
            None => false,
        }
    }

    /// Remove every session whose transport is gone. Returns the removed ids.
    pub async fn purge_destroyed(&self) -> Vec<String> {
        let dead: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| s.transport.is_destroyed() || !s.controller.is_running())
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        let mut removed = Vec::with_capacity(dead.len());
        for session in dead {
            removed.push(session.id.clone());
            close_session(session).await;
        }
        if !removed.is_empty() {
            tracing::info!(count = removed.len(), "purged destroyed sessions");
        }
        removed
    }

    /// Summaries of every live session, ordered by id.
    pub fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<Arc<Session>> = {
            let guard = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
            guard.values().cloned().collect()
        };
        let mut out: Vec<SessionSummary> = sessions.iter().map(|s| s.summary()).collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down every session.
    pub async fn shutdown_all(&self) {
        let all: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(|err| err.into_inner());
            sessions.drain().map(|(_, s)| s).collect()
        };
        for session in all {
            close_session(session).await;
        }
    }
}

async fn close_session(session: Arc<Session>) {
    if let Err(err) = session.controller.shutdown().await {
        tracing::debug!(session_id = %session.id, error = %err, "controller already stopped");
    }
    session.transport.disconnect();
}

/// Periodically purge sessions whose transport was destroyed.
pub fn spawn_reaper(registry: Arc<SessionRegistry>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // First tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            registry.purge_destroyed().await;
        }
    })
}
