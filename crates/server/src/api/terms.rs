//! Keyword and genre term API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::handlers::{guide_error, ApiError};
use super::programs::split_list;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TermQueryParams {
    pub prefix: Option<String>,
    /// Comma separated terms that listed terms must co-occur with
    pub associated: Option<String>,
}

impl TermQueryParams {
    fn associated(&self) -> Option<Vec<String>> {
        self.associated.as_deref().map(split_list)
    }
}

#[derive(Debug, Serialize)]
pub struct TermListResponse {
    pub terms: Vec<String>,
    pub total: usize,
}

fn term_list(terms: Vec<String>) -> Json<TermListResponse> {
    let total = terms.len();
    Json(TermListResponse { terms, total })
}

/// GET /api/v1/keywords
pub async fn list_keywords(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TermQueryParams>,
) -> Result<Json<TermListResponse>, ApiError> {
    let associated = params.associated();
    state
        .guide()
        .get_keywords(associated.as_deref(), params.prefix.as_deref())
        .await
        .map(term_list)
        .map_err(guide_error)
}

/// GET /api/v1/genres
pub async fn list_genres(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TermQueryParams>,
) -> Result<Json<TermListResponse>, ApiError> {
    let associated = params.associated();
    state
        .guide()
        .get_genres(associated.as_deref(), params.prefix.as_deref())
        .await
        .map(term_list)
        .map_err(guide_error)
}
