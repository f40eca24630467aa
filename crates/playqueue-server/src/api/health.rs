use actix_web::{HttpResponse, Responder, get, web};

use playqueue_types::HealthResponse;

use crate::events::now_ms;
use crate::state::AppState;

/// Liveness probe: uptime and active session count.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        timestamp_ms: now_ms(),
        active_sessions: state.service.active_sessions(),
    })
}
