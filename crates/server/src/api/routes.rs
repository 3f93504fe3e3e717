use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::metrics_middleware;
use super::{channels, handlers, programs, terms, update};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health, config and stats
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/stats", get(handlers::get_stats))
        // Channels
        .route("/channels", get(channels::list_channels))
        .route("/channels/{name}", get(channels::get_channel))
        .route(
            "/channels/tuner/{tuner_id}",
            get(channels::get_channel_by_tuner_id),
        )
        // Programs
        .route("/programs", get(programs::search_programs))
        // Index terms
        .route("/keywords", get(terms::list_keywords))
        .route("/genres", get(terms::list_genres))
        // Updates
        .route("/update", post(update::run_update));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::get_metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
