//! Queue API handlers.

use actix_web::{HttpResponse, Responder, get, post, web};

use playqueue_core::resolve::TrackRequest;
use playqueue_types::{ClearResponse, EnqueueRequest, EnqueueResponse, QueueView};

use super::IntoHttpResponse;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/sessions/{id}/queue",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    request_body = EnqueueRequest,
    responses(
        (status = 200, description = "Item queued", body = EnqueueResponse),
        (status = 400, description = "Neither query nor item given"),
        (status = 403, description = "Session not allowed"),
        (status = 422, description = "No result for query"),
        (status = 502, description = "Resolver or transport failure")
    )
)]
#[post("/sessions/{id}/queue")]
/// Resolve a query (or accept a resolved item) and append it to the queue.
pub async fn queue_add(
    state: web::Data<AppState>,
    id: web::Path<String>,
    body: web::Json<EnqueueRequest>,
) -> impl Responder {
    let session_id = id.into_inner();
    let req = body.into_inner();
    let result = match (req.item, req.query) {
        (Some(item), _) => {
            if item.title.trim().is_empty() || item.locator.trim().is_empty() {
                return HttpResponse::BadRequest().body("item title and locator are required");
            }
            state
                .service
                .enqueue(&session_id, TrackRequest::Resolved(item))
                .await
        }
        (None, Some(query)) => state.service.enqueue_query(&session_id, &query).await,
        (None, None) => return HttpResponse::BadRequest().body("query or item is required"),
    };
    match result {
        Ok(enqueued) => HttpResponse::Ok().json(EnqueueResponse {
            item: enqueued.item,
            position: enqueued.position,
        }),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/sessions/{id}/queue",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Current queue", body = QueueView),
        (status = 404, description = "No active session")
    )
)]
#[get("/sessions/{id}/queue")]
/// Return the current item, pending items and flags.
pub async fn queue_list(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    match state.service.queue_view(&id).await {
        Ok(view) => HttpResponse::Ok().json(view),
        Err(err) => err.into_response(),
    }
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/clear",
    params(
        ("id" = String, Path, description = "Session id")
    ),
    responses(
        (status = 200, description = "Pending items removed", body = ClearResponse),
        (status = 404, description = "No active session"),
        (status = 409, description = "Queue already empty")
    )
)]
#[post("/sessions/{id}/clear")]
/// Drop all pending items; the current item keeps playing.
pub async fn queue_clear(state: web::Data<AppState>, id: web::Path<String>) -> impl Responder {
    match state.service.clear_pending(&id).await {
        Ok(removed) => HttpResponse::Ok().json(ClearResponse { removed }),
        Err(err) => err.into_response(),
    }
}
