//! Session-scoped playback queue with retrying stream acquisition.
//!
//! Each session owns a [`controller::ControllerHandle`] that sequences
//! enqueue, acquisition, playback and failure handling. Front-ends talk to
//! [`service::PlaybackService`]; media plumbing plugs in through the traits
//! in [`adapters`].

pub mod adapters;
pub mod classify;
pub mod controller;
pub mod error;
pub mod notify;
pub mod policy;
pub mod queue;
pub mod registry;
pub mod resolve;
pub mod service;
pub mod status;

#[cfg(test)]
mod testing;

pub use adapters::{
    AttemptContext, NotificationSink, Resolver, StreamAcquirer, StreamHandle, Transport,
    TransportFactory,
};
pub use classify::{BlockingMarker, ErrorClass, classify};
pub use controller::{ControllerDeps, ControllerHandle, TransportSignals};
pub use error::{AcquireError, ResolveError, ServiceError, TransportError};
pub use policy::PlaybackPolicy;
pub use registry::{SessionRegistry, spawn_reaper};
pub use service::{Enqueued, PlaybackService, ServiceOptions};
