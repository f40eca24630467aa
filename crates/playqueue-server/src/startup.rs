//! Actix server startup + app wiring.
//!
//! Builds the shared state, routes, middleware, and OpenAPI endpoints.

use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse};
use actix_web::{App, HttpServer, web};
use anyhow::{Context as _, Result};
use futures_util::future::{LocalBoxFuture, Ready, ok};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use playqueue_core::notify::{FanoutSink, LogSink};
use playqueue_core::{PlaybackService, SessionRegistry, spawn_reaper};

use crate::adapters::{PlayerTransportFactory, YtDlp};
use crate::api;
use crate::config;
use crate::events::EventBus;
use crate::openapi;
use crate::state::AppState;

/// Build server state and start the Actix HTTP server.
pub(crate) async fn run(args: crate::Args) -> Result<()> {
    let cfg = config::load_config(args.config.as_ref())?;
    let bind = config::resolve_bind(args.bind, &cfg)?;
    let policy = config::playback_policy_from_config(&cfg)?;
    let options = config::service_options_from_config(&cfg);
    let resolver_settings = config::resolver_settings_from_config(&cfg);
    let player_settings = config::player_settings_from_config(&cfg);
    let sweep_interval = config::sweep_interval_from_config(&cfg);
    let cors_origins = config::cors_origins_from_config(&cfg);

    tracing::info!(
        bind = %bind,
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("PLAYQUEUE_GIT_SHA"),
        build_date = env!("PLAYQUEUE_BUILD_DATE"),
        "starting playqueue-server"
    );
    tracing::info!(
        resolver = %resolver_settings.program,
        player = %player_settings.program,
        max_retries = policy.max_retries,
        acquire_timeout_secs = policy.acquire_timeout.as_secs(),
        allowed_sessions = options.allowed_sessions.len(),
        "playback configured"
    );

    let events = EventBus::new();
    let sink = FanoutSink::new()
        .with(Arc::new(events.clone()))
        .with(Arc::new(LogSink));
    let ytdlp = Arc::new(YtDlp::new(resolver_settings));
    let registry = Arc::new(SessionRegistry::new(
        Arc::new(PlayerTransportFactory::new(player_settings)),
        ytdlp.clone(),
        Arc::new(sink),
        policy,
    ));
    let reaper = spawn_reaper(registry.clone(), sweep_interval);
    let service = Arc::new(PlaybackService::new(registry.clone(), ytdlp, options));
    let state = web::Data::new(AppState::new(service, events));

    HttpServer::new(move || {
        let cors = cors_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![actix_web::http::header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(FilteredLogger)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(api::health::health)
            .service(api::sessions_list)
            .service(api::queue_add)
            .service(api::queue_list)
            .service(api::queue_clear)
            .service(api::session_skip)
            .service(api::session_stop)
            .service(api::session_pause)
            .service(api::session_loop)
            .service(api::session_shuffle)
            .service(api::session_disconnect)
            .service(api::events_stream)
    })
    .bind(bind)
    .with_context(|| format!("bind {bind}"))?
    .run()
    .await?;

    tracing::info!("http server stopped; closing sessions");
    reaper.abort();
    registry.shutdown_all().await;
    Ok(())
}

/// Return true when the request path should be logged.
fn should_log_path(path: &str) -> bool {
    !(path == "/health" || path == "/events" || path.starts_with("/swagger-ui/"))
}

/// Actix middleware that filters noisy paths from logging.
struct FilteredLogger;

impl<S, B> actix_web::dev::Transform<S, ServiceRequest> for FilteredLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = FilteredLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(FilteredLoggerMiddleware { service })
    }
}

/// Service wrapper that applies the logging filter.
struct FilteredLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for FilteredLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let path = req.path().to_string();
        let should_log = should_log_path(&path);
        let method = req.method().clone();
        let peer = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("-")
            .to_string();
        let start = std::time::Instant::now();
        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            if should_log {
                tracing::info!(
                    method = %method,
                    path = %path,
                    status = %res.status().as_u16(),
                    peer = %peer,
                    elapsed_ms = %start.elapsed().as_millis(),
                    "http request"
                );
            }
            Ok(res)
        })
    }
}
