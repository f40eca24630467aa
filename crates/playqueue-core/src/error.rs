use std::time::Duration;

use thiserror::Error;

use crate::classify::{ErrorClass, classify};

/// Failure turning a request into an [`playqueue_types::Item`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no result for {query:?}")]
    NotFound { query: String },
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl ResolveError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ResolveError::NotFound { .. } => ErrorClass::Generic,
            ResolveError::Upstream(message) => classify(message),
        }
    }
}

/// Failure opening a stream for an item.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("{message}")]
    Failed { message: String },
    #[error("stream acquisition timed out after {0:?}")]
    TimedOut(Duration),
}

impl AcquireError {
    pub fn failed(message: impl Into<String>) -> Self {
        AcquireError::Failed {
            message: message.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            AcquireError::Failed { message } => classify(message),
            AcquireError::TimedOut(_) => ErrorClass::Generic,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport offline")]
    Offline,
    #[error("transport failed: {0}")]
    Failed(String),
}

/// Typed failures returned to front-ends.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no active session")]
    NoActiveSession,
    #[error("nothing is playing")]
    NothingPlaying,
    #[error("queue is already empty")]
    AlreadyEmpty,
    #[error("session {0} is not allowed")]
    SessionNotAllowed(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("could not resolve item: {0}")]
    Resolution(#[from] ResolveError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("session controller stopped")]
    ControllerGone,
}
