//! Fakes shared by the controller, registry and service tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use playqueue_types::{Item, Notification, NotificationKind};

use crate::adapters::{
    AttemptContext, NotificationSink, Resolver, StreamAcquirer, StreamHandle, Transport,
    TransportFactory,
};
use crate::controller::TransportSignals;
use crate::error::{AcquireError, ResolveError, TransportError};

pub(crate) fn item(title: &str) -> Item {
    Item::new(title, format!("https://media.example/{title}"))
}

pub(crate) enum Outcome {
    Ok,
    Fail(String),
    /// Never completes.
    Hang,
    /// Waits for the notify, then succeeds.
    Gate(Arc<Notify>),
}

impl Outcome {
    pub(crate) fn fail(message: &str) -> Self {
        Outcome::Fail(message.to_string())
    }
}

/// Acquirer whose results are scripted per item title. Unscripted calls succeed.
#[derive(Default)]
pub(crate) struct ScriptedAcquirer {
    script: Mutex<HashMap<String, VecDeque<Outcome>>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedAcquirer {
    pub(crate) fn script(&self, title: &str, outcomes: Vec<Outcome>) {
        let mut script = self.script.lock().unwrap();
        script.entry(title.to_string()).or_default().extend(outcomes);
    }

    pub(crate) fn gate(&self, title: &str) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        self.script(title, vec![Outcome::Gate(notify.clone())]);
        notify
    }

    pub(crate) fn calls_for(&self, title: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.iter().filter(|(t, _)| t == title).count()
    }

    /// Whole seconds between consecutive acquisitions of `title`.
    pub(crate) fn call_gaps(&self, title: &str) -> Vec<u64> {
        let calls = self.calls.lock().unwrap();
        let times: Vec<Instant> = calls
            .iter()
            .filter(|(t, _)| t == title)
            .map(|(_, at)| *at)
            .collect();
        times
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_secs())
            .collect()
    }
}

#[async_trait]
impl StreamAcquirer for ScriptedAcquirer {
    async fn acquire(&self, item: &Item, _ctx: AttemptContext) -> Result<StreamHandle, AcquireError> {
        self.calls
            .lock()
            .unwrap()
            .push((item.title.clone(), Instant::now()));
        let outcome = self
            .script
            .lock()
            .unwrap()
            .get_mut(&item.title)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(Outcome::Ok);
        match outcome {
            Outcome::Ok => Ok(StreamHandle::new(item.title.clone(), tokio::io::empty())),
            Outcome::Fail(message) => Err(AcquireError::failed(message)),
            Outcome::Hang => std::future::pending().await,
            Outcome::Gate(notify) => {
                notify.notified().await;
                Ok(StreamHandle::new(item.title.clone(), tokio::io::empty()))
            }
        }
    }
}

/// Transport that records what it was asked to play and keeps the latest signals.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    played: Mutex<Vec<String>>,
    signals: Mutex<Option<TransportSignals>>,
    force_stops: AtomicUsize,
    paused: AtomicBool,
    destroyed: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn played(&self) -> Vec<String> {
        self.played.lock().unwrap().clone()
    }

    pub(crate) fn force_stops(&self) -> usize {
        self.force_stops.load(Ordering::SeqCst)
    }

    pub(crate) fn current_signals(&self) -> Option<TransportSignals> {
        self.signals.lock().unwrap().clone()
    }

    pub(crate) fn finish_current(&self) {
        if let Some(signals) = self.signals.lock().unwrap().take() {
            signals.finished();
        }
    }

    pub(crate) fn error_current(&self, detail: &str) {
        if let Some(signals) = self.signals.lock().unwrap().take() {
            signals.error(detail);
        }
    }

    pub(crate) fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

impl Transport for RecordingTransport {
    fn play(&self, stream: StreamHandle, signals: TransportSignals) -> Result<(), TransportError> {
        if self.is_destroyed() {
            return Err(TransportError::Offline);
        }
        self.played.lock().unwrap().push(stream.label().to_string());
        *self.signals.lock().unwrap() = Some(signals);
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn force_stop(&self) -> Result<(), TransportError> {
        self.force_stops.fetch_add(1, Ordering::SeqCst);
        // Real players report the kill as an external stop.
        if let Some(signals) = self.signals.lock().unwrap().take() {
            signals.stopped_externally();
        }
        Ok(())
    }

    fn pause_toggle(&self) -> Result<bool, TransportError> {
        let paused = !self.paused.load(Ordering::SeqCst);
        self.paused.store(paused, Ordering::SeqCst);
        Ok(paused)
    }

    fn disconnect(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

/// Factory handing out recording transports and remembering them by session.
#[derive(Default)]
pub(crate) struct RecordingFactory {
    transports: Mutex<HashMap<String, Arc<RecordingTransport>>>,
    refuse: AtomicBool,
}

impl RecordingFactory {
    pub(crate) fn transport(&self, session_id: &str) -> Option<Arc<RecordingTransport>> {
        self.transports.lock().unwrap().get(session_id).cloned()
    }

    pub(crate) fn connections(&self) -> usize {
        self.transports.lock().unwrap().len()
    }

    pub(crate) fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }
}

impl TransportFactory for RecordingFactory {
    fn connect(&self, session_id: &str) -> Result<Arc<dyn Transport>, TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Offline);
        }
        let transport = Arc::new(RecordingTransport::default());
        self.transports
            .lock()
            .unwrap()
            .insert(session_id.to_string(), transport.clone());
        Ok(transport)
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<(String, Notification)>>,
}

impl RecordingSink {
    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub(crate) fn for_session(&self, session_id: &str) -> Vec<Notification> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == session_id)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub(crate) fn kinds(&self) -> Vec<NotificationKind> {
        self.notifications().iter().map(Notification::kind).collect()
    }

    pub(crate) fn count(&self, kind: NotificationKind) -> usize {
        self.kinds().into_iter().filter(|k| *k == kind).count()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, session_id: &str, notification: Notification) {
        self.events
            .lock()
            .unwrap()
            .push((session_id.to_string(), notification));
    }
}

/// Resolver backed by a fixed catalogue; searches may be scripted to fail first.
#[derive(Default)]
pub(crate) struct CatalogueResolver {
    failures: Mutex<VecDeque<ResolveError>>,
    searches: AtomicUsize,
    lookups: AtomicUsize,
}

impl CatalogueResolver {
    pub(crate) fn fail_next(&self, errors: Vec<ResolveError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub(crate) fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for CatalogueResolver {
    async fn search(&self, query: &str) -> Result<Item, ResolveError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        if query == "nothing" {
            return Err(ResolveError::NotFound {
                query: query.to_string(),
            });
        }
        Ok(item(query))
    }

    async fn lookup(&self, locator: &str) -> Result<Item, ResolveError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(Item::new(format!("direct {locator}"), locator))
    }
}
