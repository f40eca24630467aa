//! Front-end facing operations over the session registry.
//!
//! Every call names a session; commands against a session that does not
//! exist fail with [`ServiceError::NoActiveSession`] except `enqueue`, which
//! creates it.

use std::sync::Arc;

use playqueue_types::{Item, QueueView, SessionSummary};

use crate::adapters::Resolver;
use crate::error::ServiceError;
use crate::registry::{Session, SessionRegistry};
use crate::resolve::{DEFAULT_DIRECT_HOSTS, TrackRequest, resolve_request};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Session ids allowed to use the service. Empty allows all.
    pub allowed_sessions: Vec<String>,
    pub direct_hosts: Vec<String>,
    pub search_retries: u32,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            allowed_sessions: Vec::new(),
            direct_hosts: DEFAULT_DIRECT_HOSTS.iter().map(|h| h.to_string()).collect(),
            search_retries: 2,
        }
    }
}

/// Result of a successful enqueue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Enqueued {
    pub item: Item,
    /// 1-based position in the pending queue.
    pub position: usize,
}

pub struct PlaybackService {
    registry: Arc<SessionRegistry>,
    resolver: Arc<dyn Resolver>,
    options: ServiceOptions,
}

impl PlaybackService {
    pub fn new(
        registry: Arc<SessionRegistry>,
        resolver: Arc<dyn Resolver>,
        options: ServiceOptions,
    ) -> Self {
        Self {
            registry,
            resolver,
            options,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    fn check_allowed(&self, session_id: &str) -> Result<(), ServiceError> {
        let allowed = &self.options.allowed_sessions;
        if allowed.is_empty() || allowed.iter().any(|id| id == session_id) {
            Ok(())
        } else {
            tracing::warn!(session_id = %session_id, "rejected session outside allow-list");
            Err(ServiceError::SessionNotAllowed(session_id.to_string()))
        }
    }

    fn session(&self, session_id: &str) -> Result<Arc<Session>, ServiceError> {
        self.check_allowed(session_id)?;
        self.registry
            .get(session_id)
            .ok_or(ServiceError::NoActiveSession)
    }

    /// Resolve free-form input and append it to the session's queue.
    pub async fn enqueue_query(&self, session_id: &str, query: &str) -> Result<Enqueued, ServiceError> {
        let request = TrackRequest::parse(query, &self.options.direct_hosts)
            .ok_or_else(|| ServiceError::InvalidRequest("query is empty".to_string()))?;
        self.enqueue(session_id, request).await
    }

    /// Resolve `request` and append it, creating the session when needed.
    ///
    /// Resolution happens before the session is touched, so a failed lookup
    /// leaves the queue unchanged.
    pub async fn enqueue(&self, session_id: &str, request: TrackRequest) -> Result<Enqueued, ServiceError> {
        self.check_allowed(session_id)?;
        let item = resolve_request(
            self.resolver.as_ref(),
            request,
            self.options.search_retries,
        )
        .await
        .inspect_err(|err| {
            tracing::info!(session_id = %session_id, error = %err, "resolution failed");
        })?;
        let session = self.registry.get_or_create(session_id)?;
        let position = session.controller.enqueue(item.clone()).await?;
        Ok(Enqueued { item, position })
    }

    pub async fn skip(&self, session_id: &str) -> Result<(), ServiceError> {
        self.session(session_id)?.controller.skip().await
    }

    pub async fn stop(&self, session_id: &str) -> Result<(), ServiceError> {
        self.session(session_id)?.controller.stop().await
    }

    pub async fn set_loop(&self, session_id: &str, enabled: bool) -> Result<(), ServiceError> {
        self.session(session_id)?.controller.set_loop(enabled).await
    }

    pub async fn set_shuffle(&self, session_id: &str, enabled: bool) -> Result<(), ServiceError> {
        self.session(session_id)?.controller.set_shuffle(enabled).await
    }

    pub async fn pause_toggle(&self, session_id: &str) -> Result<bool, ServiceError> {
        self.session(session_id)?.controller.pause_toggle().await
    }

    /// Drop every pending item, returning how many were removed.
    pub async fn clear_pending(&self, session_id: &str) -> Result<usize, ServiceError> {
        self.session(session_id)?.controller.clear_pending().await
    }

    pub async fn list_pending(&self, session_id: &str) -> Result<Vec<Item>, ServiceError> {
        Ok(self.queue_view(session_id).await?.pending)
    }

    pub async fn queue_view(&self, session_id: &str) -> Result<QueueView, ServiceError> {
        self.session(session_id)?.controller.view().await
    }

    /// Stop playback, release the transport connection and forget the session.
    pub async fn disconnect(&self, session_id: &str) -> Result<(), ServiceError> {
        self.check_allowed(session_id)?;
        if self.registry.remove(session_id).await {
            Ok(())
        } else {
            Err(ServiceError::NoActiveSession)
        }
    }

    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.registry.list()
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }
}
