//! HTTP API handlers.
//!
//! Defines the Actix routes for queue control, sessions, events and health.

pub mod health;
pub mod queue;
pub mod sessions;
pub mod streams;

use actix_web::HttpResponse;

use playqueue_core::{ResolveError, ServiceError};

pub use queue::{queue_add, queue_clear, queue_list};
pub use sessions::{
    session_disconnect,
    session_loop,
    session_pause,
    session_shuffle,
    session_skip,
    session_stop,
    sessions_list,
};
pub use streams::events_stream;

/// Map typed failures onto HTTP responses.
pub(crate) trait IntoHttpResponse {
    fn into_response(self) -> HttpResponse;
}

impl IntoHttpResponse for ServiceError {
    fn into_response(self) -> HttpResponse {
        let message = self.to_string();
        match self {
            ServiceError::NoActiveSession => HttpResponse::NotFound().body(message),
            ServiceError::NothingPlaying | ServiceError::AlreadyEmpty => {
                HttpResponse::Conflict().body(message)
            }
            ServiceError::SessionNotAllowed(_) => HttpResponse::Forbidden().body(message),
            ServiceError::InvalidRequest(_) => HttpResponse::BadRequest().body(message),
            ServiceError::Resolution(ResolveError::NotFound { .. }) => {
                HttpResponse::UnprocessableEntity().body(message)
            }
            ServiceError::Resolution(ResolveError::Upstream(_)) | ServiceError::Transport(_) => {
                HttpResponse::BadGateway().body(message)
            }
            ServiceError::ControllerGone => HttpResponse::ServiceUnavailable().body(message),
        }
    }
}
