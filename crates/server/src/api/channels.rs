//! Channel API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tvguide_core::Channel;

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChannelListParams {
    #[serde(default = "default_sorted")]
    pub sorted: bool,
}

fn default_sorted() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChannelListResponse {
    pub channels: Vec<Arc<Channel>>,
    pub total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/channels
///
/// List channels, one per name, in listing order unless `sorted=false`.
pub async fn list_channels(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChannelListParams>,
) -> Json<ChannelListResponse> {
    let channels = state.guide().get_channels(params.sorted);
    let total = channels.len();
    Json(ChannelListResponse { channels, total })
}

/// GET /api/v1/channels/{name}
pub async fn get_channel(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<Arc<Channel>>, ApiError> {
    state
        .guide()
        .get_channel(&name)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("Channel not found: {}", name)))
}

/// GET /api/v1/channels/tuner/{tuner_id}
pub async fn get_channel_by_tuner_id(
    State(state): State<Arc<AppState>>,
    Path(tuner_id): Path<String>,
) -> Result<Json<Arc<Channel>>, ApiError> {
    state
        .guide()
        .get_channel_by_tuner_id(&tuner_id)
        .map(Json)
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("No channel for tuner id: {}", tuner_id),
            )
        })
}
