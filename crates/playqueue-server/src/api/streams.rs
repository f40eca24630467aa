//! Server-sent event stream of controller notifications.

use std::collections::VecDeque;
use std::time::Instant;

use actix_web::http::header;
use actix_web::web::Bytes;
use actix_web::{Error, HttpResponse, Responder, get, web};
use futures_util::{Stream, stream::unfold};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Duration, Interval, MissedTickBehavior};
use utoipa::IntoParams;

use playqueue_types::SessionEvent;

use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Only forward events for this session.
    pub session: Option<String>,
}

struct EventStreamState {
    receiver: broadcast::Receiver<SessionEvent>,
    session: Option<String>,
    interval: Interval,
    pending: VecDeque<Bytes>,
    last_ping: Instant,
}

pub(crate) fn sse_event(event: &str, data: &str) -> Bytes {
    let mut payload = String::new();
    payload.push_str("event: ");
    payload.push_str(event);
    payload.push('\n');
    for line in data.lines() {
        payload.push_str("data: ");
        payload.push_str(line);
        payload.push('\n');
    }
    payload.push('\n');
    Bytes::from(payload)
}

fn push_ping_if_needed(pending: &mut VecDeque<Bytes>, last_ping: &mut Instant) {
    if pending.is_empty() && last_ping.elapsed() >= PING_INTERVAL {
        *last_ping = Instant::now();
        pending.push_back(Bytes::from(": ping\n\n"));
    }
}

enum StreamSignal<E> {
    Tick,
    Event(Result<E, RecvError>),
}

async fn recv_signal<E: Clone>(
    receiver: &mut broadcast::Receiver<E>,
    interval: &mut Interval,
) -> StreamSignal<E> {
    tokio::select! {
        _ = interval.tick() => StreamSignal::Tick,
        result = receiver.recv() => StreamSignal::Event(result),
    }
}

fn sse_response<S>(stream: S) -> HttpResponse
where
    S: Stream<Item = Result<Bytes, Error>> + 'static,
{
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream)
}

#[utoipa::path(
    get,
    path = "/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "Notification event stream")
    )
)]
#[get("/events")]
/// Stream controller notifications via server-sent events.
///
/// Each event is named after the notification kind and carries a
/// `SessionEvent` JSON payload.
pub async fn events_stream(
    state: web::Data<AppState>,
    query: web::Query<EventsQuery>,
) -> impl Responder {
    let receiver = state.events.subscribe();
    let mut interval = tokio::time::interval(PING_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let stream = unfold(
        EventStreamState {
            receiver,
            session: query.into_inner().session,
            interval,
            pending: VecDeque::new(),
            last_ping: Instant::now(),
        },
        |mut ctx| async move {
            loop {
                if let Some(bytes) = ctx.pending.pop_front() {
                    return Some((Ok::<Bytes, Error>(bytes), ctx));
                }

                match recv_signal(&mut ctx.receiver, &mut ctx.interval).await {
                    StreamSignal::Tick => {}
                    StreamSignal::Event(result) => match result {
                        Ok(event) => {
                            if ctx
                                .session
                                .as_deref()
                                .is_some_and(|id| id != event.session_id)
                            {
                                continue;
                            }
                            let name = event_name(&event);
                            let json = serde_json::to_string(&event)
                                .unwrap_or_else(|_| "null".to_string());
                            ctx.pending.push_back(sse_event(name, &json));
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(skipped, "event subscriber lagged");
                        }
                        Err(RecvError::Closed) => return None,
                    },
                }

                push_ping_if_needed(&mut ctx.pending, &mut ctx.last_ping);
            }
        },
    );

    sse_response(stream)
}

fn event_name(event: &SessionEvent) -> &'static str {
    use playqueue_types::NotificationKind;
    match event.notification.kind() {
        NotificationKind::NowPlaying => "now_playing",
        NotificationKind::QueueEmpty => "queue_empty",
        NotificationKind::Added => "added",
        NotificationKind::Retrying => "retrying",
        NotificationKind::ErrorFinal => "error_final",
        NotificationKind::ErrorGeneric => "error_generic",
    }
}
