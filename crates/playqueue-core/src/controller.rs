//! Per-session playback controller.
//!
//! The controller runs as one tokio task that owns the queue store and the
//! retry context. Front-end commands, acquisition results, retry/advance
//! timers and transport signals all arrive as messages on a single channel,
//! so transitions for one session happen strictly in arrival order.
//!
//! Every asynchronous completion carries the [`Ticket`] that was current when
//! it was started. The generation part is bumped on every explicit stop/skip
//! and the attempt part on every new acquisition, so completions from a
//! superseded attempt never match and are dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use playqueue_types::{ControllerState, Item, Notification, PlaybackEndReason, QueueView};

use crate::adapters::{AttemptContext, NotificationSink, StreamAcquirer, StreamHandle, Transport};
use crate::error::{AcquireError, ServiceError};
use crate::policy::{PlaybackPolicy, RetryContext, RetryDecision};
use crate::queue::QueueStore;
use crate::status::{SessionStatus, StatusStore};

const ERROR_DETAIL_MAX_CHARS: usize = 100;

/// Identity of one acquisition/playback attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
    attempt: u64,
}

enum Command {
    Enqueue {
        item: Item,
        reply: oneshot::Sender<usize>,
    },
    Skip {
        reply: oneshot::Sender<Result<(), ServiceError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    SetLoop {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    SetShuffle {
        enabled: bool,
        reply: oneshot::Sender<()>,
    },
    PauseToggle {
        reply: oneshot::Sender<Result<bool, ServiceError>>,
    },
    ClearPending {
        reply: oneshot::Sender<Result<usize, ServiceError>>,
    },
    View {
        reply: oneshot::Sender<QueueView>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

enum Msg {
    Command(Command),
    AcquireDone {
        ticket: Ticket,
        result: Result<StreamHandle, AcquireError>,
    },
    RetryDue(Ticket),
    AdvanceDue(Ticket),
    TransportEnded {
        ticket: Ticket,
        reason: PlaybackEndReason,
        detail: Option<String>,
    },
}

/// Callback handle given to the transport with each stream.
///
/// Signals sent after the attempt was superseded, or after the controller
/// stopped, are ignored.
#[derive(Clone)]
pub struct TransportSignals {
    tx: mpsc::WeakUnboundedSender<Msg>,
    ticket: Ticket,
}

impl TransportSignals {
    pub fn finished(&self) {
        self.ended(PlaybackEndReason::Finished, None);
    }

    pub fn stopped_externally(&self) {
        self.ended(PlaybackEndReason::StoppedExternally, None);
    }

    pub fn error(&self, detail: impl Into<String>) {
        self.ended(PlaybackEndReason::Error, Some(detail.into()));
    }

    pub fn ended(&self, reason: PlaybackEndReason, detail: Option<String>) {
        if let Some(tx) = self.tx.upgrade() {
            let _ = tx.send(Msg::TransportEnded {
                ticket: self.ticket,
                reason,
                detail,
            });
        }
    }
}

/// Collaborators a controller needs.
#[derive(Clone)]
pub struct ControllerDeps {
    pub acquirer: Arc<dyn StreamAcquirer>,
    pub transport: Arc<dyn Transport>,
    pub sink: Arc<dyn NotificationSink>,
}

/// Cloneable front door to a running controller task.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Msg>,
    status: StatusStore,
}

impl ControllerHandle {
    /// Spawn the controller task on the current tokio runtime.
    pub fn spawn(session_id: impl Into<String>, policy: PlaybackPolicy, deps: ControllerDeps) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let status = StatusStore::default();
        let controller = Controller {
            session_id: session_id.into(),
            queue: QueueStore::new(),
            state: ControllerState::Idle,
            retry: RetryContext::default(),
            generation: 0,
            attempt_seq: 0,
            replay: None,
            paused: false,
            policy,
            deps,
            tx: tx.downgrade(),
            acquisition: None,
            timer: None,
            status: status.clone(),
        };
        tokio::spawn(controller.run(rx));
        Self { tx, status }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.snapshot()
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Msg::Command(make(reply)))
            .map_err(|_| ServiceError::ControllerGone)?;
        rx.await.map_err(|_| ServiceError::ControllerGone)
    }

    /// Append an item; starts playback when idle. Returns the 1-based queue position.
    pub async fn enqueue(&self, item: Item) -> Result<usize, ServiceError> {
        self.request(|reply| Command::Enqueue { item, reply }).await
    }

    pub async fn skip(&self) -> Result<(), ServiceError> {
        self.request(|reply| Command::Skip { reply }).await?
    }

    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn set_loop(&self, enabled: bool) -> Result<(), ServiceError> {
        self.request(|reply| Command::SetLoop { enabled, reply }).await
    }

    pub async fn set_shuffle(&self, enabled: bool) -> Result<(), ServiceError> {
        self.request(|reply| Command::SetShuffle { enabled, reply }).await
    }

    pub async fn pause_toggle(&self) -> Result<bool, ServiceError> {
        self.request(|reply| Command::PauseToggle { reply }).await?
    }

    pub async fn clear_pending(&self) -> Result<usize, ServiceError> {
        self.request(|reply| Command::ClearPending { reply }).await?
    }

    pub async fn view(&self) -> Result<QueueView, ServiceError> {
        self.request(|reply| Command::View { reply }).await
    }

    /// Stop playback and end the controller task.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}

struct Controller {
    session_id: String,
    queue: QueueStore,
    state: ControllerState,
    retry: RetryContext,
    generation: u64,
    attempt_seq: u64,
    /// Item that just finished, kept for loop replay while draining.
    replay: Option<Item>,
    paused: bool,
    policy: PlaybackPolicy,
    deps: ControllerDeps,
    tx: mpsc::WeakUnboundedSender<Msg>,
    acquisition: Option<JoinHandle<()>>,
    timer: Option<JoinHandle<()>>,
    status: StatusStore,
}

impl Controller {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Msg>) {
        tracing::debug!(session_id = %self.session_id, "controller started");
        while let Some(msg) = rx.recv().await {
            let keep_running = self.handle(msg);
            self.publish_status();
            if !keep_running {
                break;
            }
        }
        self.cancel_in_flight();
        tracing::debug!(session_id = %self.session_id, "controller stopped");
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation,
            attempt: self.attempt_seq,
        }
    }

    fn handle(&mut self, msg: Msg) -> bool {
        match msg {
            Msg::Command(command) => return self.on_command(command),
            Msg::AcquireDone { ticket, result } => self.on_acquire_done(ticket, result),
            Msg::RetryDue(ticket) => self.on_retry_due(ticket),
            Msg::AdvanceDue(ticket) => self.on_advance_due(ticket),
            Msg::TransportEnded {
                ticket,
                reason,
                detail,
            } => self.on_transport_ended(ticket, reason, detail),
        }
        true
    }

    /// Returns `false` once the controller should exit.
    fn on_command(&mut self, command: Command) -> bool {
        match command {
            Command::Enqueue { item, reply } => {
                let position = self.queue.enqueue(item.clone());
                self.notify(Notification::Added { item, position });
                let _ = reply.send(position);
                if self.state == ControllerState::Idle {
                    self.start_next();
                }
            }
            Command::Skip { reply } => {
                let _ = reply.send(self.skip());
            }
            Command::Stop { reply } => {
                self.reset(true);
                let _ = reply.send(());
            }
            Command::SetLoop { enabled, reply } => {
                self.queue.set_loop(enabled);
                let _ = reply.send(());
            }
            Command::SetShuffle { enabled, reply } => {
                self.queue.set_shuffle(enabled);
                let _ = reply.send(());
            }
            Command::PauseToggle { reply } => {
                let _ = reply.send(self.pause_toggle());
            }
            Command::ClearPending { reply } => {
                let result = if self.queue.is_empty() {
                    Err(ServiceError::AlreadyEmpty)
                } else {
                    Ok(self.queue.clear_pending())
                };
                let _ = reply.send(result);
            }
            Command::View { reply } => {
                let _ = reply.send(self.view());
            }
            Command::Shutdown { reply } => {
                self.reset(false);
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Pick the next item (loop replay first) and start acquiring it.
    fn start_next(&mut self) {
        self.cancel_timer();
        let replay = self.replay.take().filter(|_| self.queue.loop_current());
        let Some(item) = replay.or_else(|| self.queue.take_next()) else {
            self.state = ControllerState::Idle;
            tracing::debug!(session_id = %self.session_id, "queue drained");
            self.notify(Notification::QueueEmpty);
            return;
        };
        self.retry.reset();
        self.queue.set_current(item);
        self.state = ControllerState::Attempting;
        self.spawn_attempt();
    }

    fn spawn_attempt(&mut self) {
        let Some(item) = self.queue.current().cloned() else {
            return;
        };
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        self.attempt_seq += 1;
        let ticket = self.ticket();
        let ctx = AttemptContext {
            attempt: self.retry.attempt_count,
            timeout: self.policy.acquire_timeout,
        };
        let acquirer = self.deps.acquirer.clone();
        tracing::debug!(
            session_id = %self.session_id,
            title = %item.title,
            attempt = ctx.attempt,
            "acquiring stream"
        );
        self.acquisition = Some(tokio::spawn(async move {
            let result = match tokio::time::timeout(ctx.timeout, acquirer.acquire(&item, ctx)).await {
                Ok(result) => result,
                Err(_) => Err(AcquireError::TimedOut(ctx.timeout)),
            };
            let _ = tx.send(Msg::AcquireDone { ticket, result });
        }));
    }

    fn on_acquire_done(&mut self, ticket: Ticket, result: Result<StreamHandle, AcquireError>) {
        if ticket != self.ticket() || self.state != ControllerState::Attempting {
            tracing::debug!(session_id = %self.session_id, "ignoring stale acquisition result");
            return;
        }
        self.acquisition = None;
        let Some(item) = self.queue.current().cloned() else {
            return;
        };
        match result {
            Ok(stream) => self.hand_to_transport(item, stream),
            Err(err) => self.on_acquire_failed(item, err),
        }
    }

    fn hand_to_transport(&mut self, item: Item, stream: StreamHandle) {
        let signals = TransportSignals {
            tx: self.tx.clone(),
            ticket: self.ticket(),
        };
        match self.deps.transport.play(stream, signals) {
            Ok(()) => {
                let retries = self.retry.attempt_count;
                self.retry.reset();
                self.state = ControllerState::Playing;
                self.paused = false;
                self.notify(Notification::NowPlaying {
                    item,
                    remaining: self.queue.pending_len(),
                    loop_enabled: self.queue.loop_current(),
                    retries,
                });
            }
            Err(err) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    title = %item.title,
                    error = %err,
                    "transport rejected stream"
                );
                self.queue.take_current();
                self.notify(Notification::ErrorGeneric {
                    item,
                    message: truncate_detail(&err.to_string()),
                });
                self.drain(None, self.policy.generic_failure_delay);
            }
        }
    }

    fn on_acquire_failed(&mut self, item: Item, err: AcquireError) {
        let class = err.class();
        tracing::warn!(
            session_id = %self.session_id,
            title = %item.title,
            class = %class,
            error = %err,
            "stream acquisition failed"
        );
        match self.policy.on_failure(&mut self.retry, class) {
            RetryDecision::Retry { attempt, delay } => {
                self.notify(Notification::Retrying {
                    item,
                    attempt,
                    max_attempts: self.policy.max_retries,
                    wait_secs: delay.as_secs(),
                });
                let ticket = self.ticket();
                self.schedule(delay, Msg::RetryDue(ticket));
            }
            RetryDecision::GiveUp { attempts } => {
                self.queue.take_current();
                self.notify(Notification::ErrorFinal { item, attempts });
                self.drain(None, self.policy.final_failure_delay);
            }
            RetryDecision::Skip => {
                self.queue.take_current();
                self.notify(Notification::ErrorGeneric {
                    item,
                    message: truncate_detail(&err.to_string()),
                });
                self.drain(None, self.policy.generic_failure_delay);
            }
        }
    }

    fn on_retry_due(&mut self, ticket: Ticket) {
        if ticket != self.ticket() || self.state != ControllerState::Attempting {
            return;
        }
        self.timer = None;
        self.spawn_attempt();
    }

    fn on_advance_due(&mut self, ticket: Ticket) {
        if ticket != self.ticket() || self.state != ControllerState::Draining {
            return;
        }
        self.timer = None;
        self.start_next();
    }

    fn on_transport_ended(&mut self, ticket: Ticket, reason: PlaybackEndReason, detail: Option<String>) {
        if ticket != self.ticket() || self.state != ControllerState::Playing {
            tracing::debug!(session_id = %self.session_id, ?reason, "ignoring stale transport signal");
            return;
        }
        let Some(item) = self.queue.take_current() else {
            return;
        };
        self.paused = false;
        match reason {
            PlaybackEndReason::Finished | PlaybackEndReason::StoppedExternally => {
                tracing::debug!(session_id = %self.session_id, title = %item.title, ?reason, "item ended");
                self.drain(Some(item), self.policy.advance_delay);
            }
            PlaybackEndReason::Error => {
                let message = detail.unwrap_or_else(|| "transport error".to_string());
                tracing::warn!(
                    session_id = %self.session_id,
                    title = %item.title,
                    error = %message,
                    "transport failed mid-playback"
                );
                self.notify(Notification::ErrorGeneric {
                    item,
                    message: truncate_detail(&message),
                });
                self.drain(None, self.policy.advance_delay);
            }
        }
    }

    /// Enter `Draining` and advance now or after `delay`.
    fn drain(&mut self, replay: Option<Item>, delay: Duration) {
        self.state = ControllerState::Draining;
        self.replay = replay;
        if delay.is_zero() {
            self.start_next();
        } else {
            let ticket = self.ticket();
            self.schedule(delay, Msg::AdvanceDue(ticket));
        }
    }

    fn skip(&mut self) -> Result<(), ServiceError> {
        if self.state == ControllerState::Idle {
            return Err(ServiceError::NothingPlaying);
        }
        let was_playing = self.state == ControllerState::Playing;
        self.generation += 1;
        self.cancel_in_flight();
        if was_playing {
            if let Err(err) = self.deps.transport.force_stop() {
                tracing::warn!(session_id = %self.session_id, error = %err, "force stop failed");
            }
        }
        if let Some(item) = self.queue.take_current() {
            tracing::debug!(session_id = %self.session_id, title = %item.title, "skipped");
        }
        self.paused = false;
        self.drain(None, self.policy.advance_delay);
        Ok(())
    }

    /// Clear everything and return to `Idle`, discarding in-flight work.
    fn reset(&mut self, log: bool) {
        self.generation += 1;
        self.cancel_in_flight();
        if matches!(
            self.state,
            ControllerState::Playing | ControllerState::Attempting
        ) {
            if let Err(err) = self.deps.transport.force_stop() {
                tracing::warn!(session_id = %self.session_id, error = %err, "force stop failed");
            }
        }
        self.queue.clear();
        self.replay = None;
        self.retry.reset();
        self.paused = false;
        self.state = ControllerState::Idle;
        if log {
            tracing::debug!(session_id = %self.session_id, "playback stopped");
        }
    }

    fn pause_toggle(&mut self) -> Result<bool, ServiceError> {
        if self.state != ControllerState::Playing {
            return Err(ServiceError::NothingPlaying);
        }
        let paused = self.deps.transport.pause_toggle()?;
        self.paused = paused;
        Ok(paused)
    }

    fn view(&self) -> QueueView {
        QueueView {
            state: self.state,
            current: self.queue.current().cloned(),
            pending: self.queue.list_pending(),
            loop_enabled: self.queue.loop_current(),
            shuffle: self.queue.shuffle(),
            paused: self.paused,
        }
    }

    fn schedule(&mut self, delay: Duration, msg: Msg) {
        self.cancel_timer();
        let Some(tx) = self.tx.upgrade() else {
            return;
        };
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(msg);
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    fn cancel_in_flight(&mut self) {
        self.cancel_timer();
        if let Some(acquisition) = self.acquisition.take() {
            acquisition.abort();
        }
    }

    fn notify(&self, notification: Notification) {
        self.deps.sink.notify(&self.session_id, notification);
    }

    fn publish_status(&self) {
        self.status.publish(SessionStatus {
            state: self.state,
            now_playing: self.queue.current().map(|item| item.title.clone()),
            pending_len: self.queue.pending_len(),
            paused: self.paused,
        });
    }
}

fn truncate_detail(message: &str) -> String {
    if message.chars().count() <= ERROR_DETAIL_MAX_CHARS {
        return message.to_string();
    }
    let mut out: String = message.chars().take(ERROR_DETAIL_MAX_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Outcome, RecordingSink, RecordingTransport, ScriptedAcquirer, item};
    use playqueue_types::NotificationKind;

    struct Harness {
        handle: ControllerHandle,
        acquirer: Arc<ScriptedAcquirer>,
        transport: Arc<RecordingTransport>,
        sink: Arc<RecordingSink>,
    }

    fn harness(policy: PlaybackPolicy) -> Harness {
        let acquirer = Arc::new(ScriptedAcquirer::default());
        let transport = Arc::new(RecordingTransport::default());
        let sink = Arc::new(RecordingSink::default());
        let handle = ControllerHandle::spawn(
            "guild-1",
            policy,
            ControllerDeps {
                acquirer: acquirer.clone(),
                transport: transport.clone(),
                sink: sink.clone(),
            },
        );
        Harness {
            handle,
            acquirer,
            transport,
            sink,
        }
    }

    fn instant_policy() -> PlaybackPolicy {
        PlaybackPolicy::default().without_pauses()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn plays_in_order_then_reports_queue_empty() {
        let h = harness(instant_policy());
        for name in ["A", "B", "C"] {
            h.handle.enqueue(item(name)).await.unwrap();
        }
        settle().await;
        assert_eq!(h.transport.played(), vec!["A"]);

        h.transport.finish_current();
        settle().await;
        h.transport.finish_current();
        settle().await;
        assert_eq!(h.transport.played(), vec!["A", "B", "C"]);
        assert_ne!(h.sink.kinds().last(), Some(&NotificationKind::QueueEmpty));

        h.transport.finish_current();
        settle().await;
        assert_eq!(h.sink.kinds().last(), Some(&NotificationKind::QueueEmpty));
        let view = h.handle.view().await.unwrap();
        assert_eq!(view.state, ControllerState::Idle);
        assert!(view.current.is_none());
        assert_eq!(h.sink.count(NotificationKind::NowPlaying), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn blocking_failures_retry_with_escalating_wait() {
        let h = harness(instant_policy());
        h.acquirer.script(
            "A",
            vec![
                Outcome::fail("HTTP Error 429: Too Many Requests"),
                Outcome::fail("Sign in to confirm you're not a bot"),
                Outcome::Ok,
            ],
        );
        h.handle.enqueue(item("A")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        let retries: Vec<(u32, u64)> = h
            .sink
            .notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Retrying { attempt, wait_secs, .. } => Some((attempt, wait_secs)),
                _ => None,
            })
            .collect();
        assert_eq!(retries, vec![(1, 3), (2, 8)]);

        let now_playing: Vec<Notification> = h
            .sink
            .notifications()
            .into_iter()
            .filter(|n| n.kind() == NotificationKind::NowPlaying)
            .collect();
        assert_eq!(now_playing.len(), 1);
        match &now_playing[0] {
            Notification::NowPlaying { item, retries, .. } => {
                assert_eq!(item.title, "A");
                assert_eq!(*retries, 2);
            }
            other => panic!("unexpected notification {other:?}"),
        }

        let gaps = h.acquirer.call_gaps("A");
        assert_eq!(gaps, vec![3, 8]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_ceiling_drops_item_and_advances() {
        let h = harness(instant_policy());
        h.acquirer.script("A", (0..5).map(|_| Outcome::fail("403 Forbidden")).collect());
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(h.acquirer.calls_for("A"), 5);
        assert_eq!(h.sink.count(NotificationKind::Retrying), 4);
        assert_eq!(h.sink.count(NotificationKind::ErrorFinal), 1);
        assert!(h.sink.notifications().contains(&Notification::ErrorFinal {
            item: item("A"),
            attempts: 4,
        }));
        assert_eq!(h.transport.played(), vec!["B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn generic_failure_is_not_retried() {
        let h = harness(instant_policy());
        h.acquirer.script("A", vec![Outcome::fail("unsupported container")]);
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        settle().await;

        assert_eq!(h.acquirer.calls_for("A"), 1);
        assert_eq!(h.sink.count(NotificationKind::Retrying), 0);
        assert_eq!(h.sink.count(NotificationKind::ErrorGeneric), 1);
        assert_eq!(h.transport.played(), vec!["B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn generic_failure_waits_configured_delay_before_advancing() {
        let policy = PlaybackPolicy {
            generic_failure_delay: Duration::from_secs(2),
            ..instant_policy()
        };
        let h = harness(policy);
        h.acquirer.script("A", vec![Outcome::fail("boom")]);
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.acquirer.calls_for("B"), 0);
        assert_eq!(h.handle.status().state, ControllerState::Draining);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.transport.played(), vec!["B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_while_playing_advances_without_failure() {
        let h = harness(instant_policy());
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        settle().await;

        h.handle.skip().await.unwrap();
        settle().await;

        assert_eq!(h.transport.played(), vec!["A", "B"]);
        assert_eq!(h.transport.force_stops(), 1);
        assert!(!h.sink.notifications().iter().any(Notification::is_failure));
        let view = h.handle.view().await.unwrap();
        assert_eq!(view.state, ControllerState::Playing);
        assert_eq!(view.current.unwrap().title, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn skip_while_idle_is_rejected() {
        let h = harness(instant_policy());
        assert!(matches!(
            h.handle.skip().await,
            Err(ServiceError::NothingPlaying)
        ));
        assert!(matches!(
            h.handle.pause_toggle().await,
            Err(ServiceError::NothingPlaying)
        ));
        assert!(matches!(
            h.handle.clear_pending().await,
            Err(ServiceError::AlreadyEmpty)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_outstanding_acquisition() {
        let h = harness(instant_policy());
        let gate = h.acquirer.gate("A");
        h.handle.enqueue(item("A")).await.unwrap();
        settle().await;
        assert_eq!(h.handle.status().state, ControllerState::Attempting);

        h.handle.stop().await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        settle().await;
        gate.notify_one();
        settle().await;

        assert_eq!(h.transport.played(), vec!["B"]);
        let view = h.handle.view().await.unwrap();
        assert_eq!(view.current.unwrap().title, "B");
        assert_eq!(h.sink.count(NotificationKind::NowPlaying), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_result_from_superseded_generation_is_ignored() {
        let h = harness(instant_policy());
        let gate_a = h.acquirer.gate("A");
        h.handle.enqueue(item("A")).await.unwrap();
        settle().await;
        let stale = Ticket {
            generation: 0,
            attempt: 1,
        };

        h.handle.stop().await.unwrap();
        let gate_b = h.acquirer.gate("B");
        h.handle.enqueue(item("B")).await.unwrap();
        settle().await;

        // Results already sitting in the channel when the stop was handled.
        let sent_ok = h.handle.tx.send(Msg::AcquireDone {
            ticket: stale,
            result: Ok(StreamHandle::new("A", tokio::io::empty())),
        });
        let sent_err = h.handle.tx.send(Msg::AcquireDone {
            ticket: stale,
            result: Err(AcquireError::failed("HTTP Error 429: Too Many Requests")),
        });
        assert!(sent_ok.is_ok() && sent_err.is_ok());
        settle().await;

        assert!(h.transport.played().is_empty());
        assert_eq!(h.sink.count(NotificationKind::Retrying), 0);
        let view = h.handle.view().await.unwrap();
        assert_eq!(view.state, ControllerState::Attempting);
        assert_eq!(view.current.unwrap().title, "B");

        gate_a.notify_one();
        gate_b.notify_one();
        settle().await;
        assert_eq!(h.transport.played(), vec!["B"]);
        assert_eq!(h.sink.count(NotificationKind::NowPlaying), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_retry() {
        let h = harness(instant_policy());
        h.acquirer.script("A", vec![Outcome::fail("blocked")]);
        h.handle.enqueue(item("A")).await.unwrap();
        settle().await;
        assert_eq!(h.sink.count(NotificationKind::Retrying), 1);

        h.handle.stop().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.acquirer.calls_for("A"), 1);
        assert_eq!(h.handle.status().state, ControllerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_replays_current_without_touching_pending() {
        let h = harness(instant_policy());
        h.handle.set_loop(true).await.unwrap();
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        settle().await;

        h.transport.finish_current();
        settle().await;

        assert_eq!(h.transport.played(), vec!["A", "A"]);
        let view = h.handle.view().await.unwrap();
        assert_eq!(view.current.unwrap().title, "A");
        assert_eq!(view.pending, vec![item("B")]);

        h.handle.set_loop(false).await.unwrap();
        h.transport.finish_current();
        settle().await;
        assert_eq!(h.transport.played(), vec!["A", "A", "B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_advances_without_retry() {
        let h = harness(instant_policy());
        h.handle.set_loop(true).await.unwrap();
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        settle().await;

        h.transport.error_current("device lost");
        settle().await;

        assert_eq!(h.acquirer.calls_for("A"), 1);
        assert_eq!(h.transport.played(), vec!["A", "B"]);
        assert!(h.sink.notifications().contains(&Notification::ErrorGeneric {
            item: item("A"),
            message: "device lost".to_string(),
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_timeout_counts_as_generic_failure() {
        let h = harness(instant_policy());
        h.acquirer.script("A", vec![Outcome::Hang]);
        h.handle.enqueue(item("A")).await.unwrap();
        h.handle.enqueue(item("B")).await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(h.sink.count(NotificationKind::ErrorGeneric), 1);
        assert_eq!(h.transport.played(), vec!["B"]);
    }

    #[tokio::test(start_paused = true)]
    async fn enqueue_while_playing_only_queues() {
        let h = harness(instant_policy());
        h.handle.enqueue(item("A")).await.unwrap();
        settle().await;
        let position = h.handle.enqueue(item("B")).await.unwrap();
        settle().await;

        assert_eq!(position, 1);
        assert_eq!(h.transport.played(), vec!["A"]);
        assert_eq!(h.handle.status().pending_len, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_stop_signal_after_skip_is_inert() {
        let h = harness(instant_policy());
        for name in ["A", "B", "C"] {
            h.handle.enqueue(item(name)).await.unwrap();
        }
        settle().await;
        let stale = h.transport.current_signals().unwrap();

        h.handle.skip().await.unwrap();
        settle().await;
        stale.finished();
        settle().await;

        assert_eq!(h.transport.played(), vec!["A", "B"]);
        assert_eq!(h.handle.view().await.unwrap().current.unwrap().title, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_ends_controller() {
        let h = harness(instant_policy());
        h.handle.enqueue(item("A")).await.unwrap();
        settle().await;
        h.handle.shutdown().await.unwrap();
        settle().await;

        assert!(!h.handle.is_running());
        assert!(matches!(
            h.handle.enqueue(item("B")).await,
            Err(ServiceError::ControllerGone)
        ));
    }

    #[test]
    fn truncate_detail_caps_length() {
        let long = "x".repeat(150);
        let out = truncate_detail(&long);
        assert_eq!(out.chars().count(), ERROR_DETAIL_MAX_CHARS + 3);
        assert_eq!(truncate_detail("short"), "short");
    }
}
