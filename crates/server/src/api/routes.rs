use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{dispatch, handlers, stream};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Classification and runs
        .route("/dispatch/check", post(dispatch::check))
        .route("/dispatch/run", post(dispatch::run))
        // Sessions
        .route("/dispatch/sessions/{id}", get(dispatch::get_session))
        .route("/dispatch/sessions/{id}/stream", get(stream::stream_session))
        // Entity id lookup diagnostics
        .route(
            "/dispatch/backing-store/{marketplace}",
            get(dispatch::check_backing_store),
        )
        .route(
            "/dispatch/entity-cache",
            get(dispatch::get_cache_stats).delete(dispatch::clear_cache),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
