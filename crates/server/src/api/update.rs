//! Guide update API handler.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use tvguide_core::UpdateSummary;

use super::handlers::{guide_error, ApiError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UpdateRequest {
    /// Backend to run; every configured backend when omitted
    #[serde(default)]
    pub backend: Option<String>,
}

/// POST /api/v1/update
///
/// Run an update and re-sync the channel cache.
pub async fn run_update(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateRequest>,
) -> Result<Json<UpdateSummary>, ApiError> {
    info!(backend = ?request.backend, "Update requested");
    state
        .guide()
        .update(request.backend.as_deref())
        .await
        .map(Json)
        .map_err(guide_error)
}
