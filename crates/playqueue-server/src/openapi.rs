use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::health::health,
        api::queue::queue_add,
        api::queue::queue_list,
        api::queue::queue_clear,
        api::sessions::sessions_list,
        api::sessions::session_skip,
        api::sessions::session_stop,
        api::sessions::session_pause,
        api::sessions::session_loop,
        api::sessions::session_shuffle,
        api::sessions::session_disconnect,
        api::streams::events_stream,
    ),
    components(
        schemas(
            playqueue_types::Item,
            playqueue_types::ControllerState,
            playqueue_types::Notification,
            playqueue_types::NotificationKind,
            playqueue_types::SessionEvent,
            playqueue_types::QueueView,
            playqueue_types::EnqueueRequest,
            playqueue_types::EnqueueResponse,
            playqueue_types::FlagRequest,
            playqueue_types::FlagResponse,
            playqueue_types::ClearResponse,
            playqueue_types::SessionSummary,
            playqueue_types::SessionsListResponse,
            playqueue_types::HealthResponse,
        )
    ),
    tags(
        (name = "playqueue-server", description = "Session playback queue API")
    )
)]
pub struct ApiDoc;
