pub mod auth;
pub mod compositor;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use crate::{config::StorageBackend, handlers::AppState};

/// Base64 inflates inline images by a third; leave room for it and the JSON around it.
fn body_limit(max_upload_size: usize) -> usize {
    max_upload_size.saturating_mul(3) / 2 + 64 * 1024
}

pub fn create_app(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        .route("/subscription", get(handlers::subscription::get_subscription))
        .route("/credits/consume", post(handlers::subscription::consume_credit))
        .route(
            "/variations",
            get(handlers::variations::list_variations).post(handlers::variations::generate_variations),
        )
        .route("/variations/:id", patch(handlers::variations::update_variation))
        .route("/variations/:id/reset", post(handlers::variations::reset_variation))
        .route("/variations/:id/download", post(handlers::variations::download_variation))
        .route(
            "/videos",
            get(handlers::videos::list_videos).post(handlers::videos::create_video),
        )
        .route("/dashboard", get(handlers::videos::dashboard))
        .route("/transcriptions", post(handlers::transcribe::transcribe))
        .route("/uploads", post(handlers::upload::upload_media));

    let mut app = Router::new()
        .route("/health", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .nest("/api/v1", api)
        .merge(handlers::docs::create_docs_router());

    if state.config.storage.backend == StorageBackend::Local {
        app = app.nest_service("/media", ServeDir::new(&state.config.storage.upload_dir));
    }

    app.layer(from_fn_with_state(state.clone(), middleware::metrics_middleware))
        .layer(DefaultBodyLimit::max(body_limit(state.config.max_upload_size)))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
