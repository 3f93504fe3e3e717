use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tvguide_core::{guide::TunerCollision, GuideError, SanitizedConfig, UpdateError};

use crate::metrics;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

/// Map a guide error to its HTTP status.
pub fn guide_error(e: GuideError) -> ApiError {
    let status = match &e {
        GuideError::InvalidFilter(_) => StatusCode::BAD_REQUEST,
        GuideError::NoUpdater => StatusCode::SERVICE_UNAVAILABLE,
        GuideError::Update(UpdateError::UnknownBackend(_)) => StatusCode::NOT_FOUND,
        GuideError::Store(_) | GuideError::Update(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub channels: usize,
    pub num_programs: u64,
    pub max_program_length: i64,
    pub tuner_collisions: Vec<TunerCollision>,
}

/// GET /api/v1/stats
///
/// Guide size as of the last sync.
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let snapshot = state.guide().snapshot();
    Json(StatsResponse {
        channels: snapshot.len(),
        num_programs: snapshot.num_programs(),
        max_program_length: snapshot.max_program_length(),
        tuner_collisions: snapshot.collisions().to_vec(),
    })
}

/// GET /metrics
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    metrics::collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tvguide_core::StoreError;

    #[test]
    fn test_guide_error_status() {
        let cases = [
            (
                GuideError::InvalidFilter("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (GuideError::NoUpdater, StatusCode::SERVICE_UNAVAILABLE),
            (
                GuideError::Update(UpdateError::UnknownBackend("xmltv".to_string())),
                StatusCode::NOT_FOUND,
            ),
            (
                GuideError::Store(StoreError::Internal("boom".to_string())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let message = error.to_string();
            let (status, Json(body)) = guide_error(error);
            assert_eq!(status, expected);
            assert_eq!(body.error, message);
        }
    }
}
