//! Session playback control handlers.

use actix_web::{HttpResponse, Responder, get, post, web};

use playqueue_types::{FlagRequest, FlagResponse, SessionsListResponse};

use super::IntoHttpResponse;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/sessions",
    responses(
        (status = 200, description = "Active sessions", body = SessionsListResponse)
    )
)]
#[get("/sessions")]
/// List active sessions.
pub async fn sessions_list(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(SessionsListResponse {
        sessions: state.service.sessions(),
    })
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/skip",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Advanced to the next item"),
        (status = 404, description = "No active session"),
        (status = 409, description = "Nothing is playing")
    )
)]
#[post("/sessions/{id}/skip")]
/// Skip the current item.
pub async fn session_skip(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    match state.service.skip(&id).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/stop",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Playback stopped and queue cleared"),
        (status = 404, description = "No active session")
    )
)]
#[post("/sessions/{id}/stop")]
/// Stop playback and clear the queue, keeping the session.
pub async fn session_stop(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    match state.service.stop(&id).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/pause",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "New paused state", body = FlagResponse),
        (status = 404, description = "No active session"),
        (status = 409, description = "Nothing is playing")
    )
)]
#[post("/sessions/{id}/pause")]
/// Toggle pause on the playing item.
pub async fn session_pause(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    match state.service.pause_toggle(&id).await {
        Ok(paused) => HttpResponse::Ok().json(FlagResponse { enabled: paused }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/loop",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    request_body = FlagRequest,
    responses(
        (status = 200, description = "Loop flag updated", body = FlagResponse),
        (status = 404, description = "No active session")
    )
)]
#[post("/sessions/{id}/loop")]
/// Enable or disable looping of the current item.
pub async fn session_loop(
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<FlagRequest>,
) -> impl Responder {
    let enabled = body.enabled;
    match state.service.set_loop(&id, enabled).await {
        Ok(()) => HttpResponse::Ok().json(FlagResponse { enabled }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/shuffle",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    request_body = FlagRequest,
    responses(
        (status = 200, description = "Shuffle flag updated", body = FlagResponse),
        (status = 404, description = "No active session")
    )
)]
#[post("/sessions/{id}/shuffle")]
/// Enable or disable random selection of the next item.
pub async fn session_shuffle(
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<FlagRequest>,
) -> impl Responder {
    let enabled = body.enabled;
    match state.service.set_shuffle(&id, enabled).await {
        Ok(()) => HttpResponse::Ok().json(FlagResponse { enabled }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/disconnect",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Session closed"),
        (status = 404, description = "No active session")
    )
)]
#[post("/sessions/{id}/disconnect")]
/// Stop playback, release the transport and forget the session.
pub async fn session_disconnect(
    state: web::Data<AppState>,
    id: web::Path<String>,
) -> impl Responder {
    match state.service.disconnect(&id).await {
        Ok(()) => HttpResponse::Ok().finish(),
        Err(err) => err.into_response(),
    }
}
