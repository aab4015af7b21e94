pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod startup;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::VaultConfig;
use crate::middleware::{admin_middleware, auth_middleware};
use crate::services::{FileStore, ObjectStore, TokenCodec, UserStore};

/// Headroom for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VaultConfig>,
    pub tokens: TokenCodec,
    pub users: Arc<dyn UserStore>,
    pub files: Arc<dyn FileStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub ip_rate_limiter: IpRateLimiter,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: VaultConfig,
        users: Arc<dyn UserStore>,
        files: Arc<dyn FileStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Result<Self, AppError> {
        let tokens = TokenCodec::new(&config.jwt)?;
        let ip_rate_limiter =
            create_ip_rate_limiter(config.rate_limit.requests, config.rate_limit.window_seconds)?;

        Ok(Self {
            config: Arc::new(config),
            tokens,
            users,
            files,
            objects,
            ip_rate_limiter,
            started_at: Instant::now(),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let auth_layer = from_fn_with_state(state.clone(), auth_middleware);
    let admin_layer = from_fn_with_state(state.clone(), admin_middleware);
    let upload_limit = state.config.limits.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;

    let auth_routes = Router::new()
        .route("/me", get(handlers::auth::me))
        .route("/logout", post(handlers::auth::logout))
        .route_layer(auth_layer.clone())
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh));

    let file_routes = Router::new()
        .route(
            "/upload",
            post(handlers::files::upload_file).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/", get(handlers::files::list_files))
        .route(
            "/:id",
            get(handlers::files::get_file)
                .put(handlers::files::update_file)
                .delete(handlers::files::delete_file),
        )
        .route("/:id/download", get(handlers::files::download_file))
        .route("/:id/share", post(handlers::files::share_file))
        .route("/search/user", get(handlers::search::search_files))
        .route("/search/filters", get(handlers::search::search_filters))
        .route_layer(auth_layer.clone());

    let user_routes = Router::new()
        .route(
            "/me",
            get(handlers::users::get_me)
                .put(handlers::users::update_me)
                .delete(handlers::users::delete_me),
        )
        .route("/change-password", post(handlers::users::change_password))
        .route("/settings", axum::routing::put(handlers::users::update_settings))
        .route("/search/user", get(handlers::search::search_files))
        .route("/search/filters", get(handlers::search::search_filters))
        .route_layer(auth_layer.clone());

    let analytics_routes = Router::new()
        .route("/storage-usage", get(handlers::analytics::storage_usage))
        .route("/file-types", get(handlers::analytics::file_types))
        .route("/user-activity", get(handlers::analytics::user_activity))
        .route_layer(auth_layer.clone());

    // Layers run outermost-last: auth verifies the token before the admin live check.
    let admin_routes = Router::new()
        .route("/stats", get(handlers::admin::stats))
        .route("/users", get(handlers::admin::list_users))
        .route("/activity", get(handlers::admin::activity))
        .route("/users/:id/suspend", post(handlers::admin::suspend_user))
        .route("/users/:id/activate", post(handlers::admin::activate_user))
        .route("/users/:id", axum::routing::delete(handlers::admin::delete_user))
        .route_layer(admin_layer.clone())
        .route_layer(auth_layer.clone());

    let system_routes = Router::new()
        .route("/info", get(handlers::system::info))
        .route("/health", get(handlers::system::health))
        .route("/backup", post(handlers::system::backup))
        .route("/logs", get(handlers::system::logs))
        .route_layer(admin_layer)
        .route_layer(auth_layer);

    let ip_limiter = state.ip_rate_limiter.clone();

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/storage/*key", get(handlers::storage::serve_object))
        .nest("/api/auth", auth_routes)
        .nest("/api/files", file_routes)
        .nest("/api/users", user_routes)
        .nest("/api/analytics/user", analytics_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/system", system_routes)
        .with_state(state)
        .layer(from_fn_with_state(ip_limiter, ip_rate_limit_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
}
