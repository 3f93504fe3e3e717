//! Program search API handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tvguide_core::{Channel, Filter, Program, ProgramAttr, SearchRequest};

use super::handlers::{api_error, guide_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

/// Query parameters of a program search. List values are comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct ProgramQueryParams {
    /// Channel names
    pub channel: Option<String>,
    /// Instant, UTC seconds. Takes precedence over `start`/`stop`.
    pub at: Option<i64>,
    pub start: Option<i64>,
    /// Range end; missing or 0 leaves the range open.
    pub stop: Option<i64>,
    pub keywords: Option<String>,
    pub genres: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub year: Option<i64>,
    pub rating: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ProgramListResponse {
    pub programs: Vec<Program>,
    pub total: usize,
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve channel names against the current snapshot.
fn resolve_channels(state: &AppState, names: &str) -> Result<Vec<Channel>, ApiError> {
    split_list(names)
        .into_iter()
        .map(|name| {
            state
                .guide()
                .get_channel(&name)
                .map(|c| (*c).clone())
                .ok_or_else(|| {
                    api_error(StatusCode::NOT_FOUND, format!("Channel not found: {}", name))
                })
        })
        .collect()
}

fn build_request(state: &AppState, params: ProgramQueryParams) -> Result<SearchRequest, ApiError> {
    let mut request = SearchRequest::new();

    if let Some(names) = params.channel.as_deref() {
        let mut channels = resolve_channels(state, names)?;
        request = if channels.len() == 1 {
            request.channel(channels.remove(0))
        } else {
            request.channels(channels)
        };
    }

    request = match (params.at, params.start, params.stop) {
        (Some(at), _, _) => request.at(at),
        (None, Some(start), stop) => request.range(start, stop.unwrap_or(0)),
        (None, None, Some(_)) => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "stop requires start",
            ))
        }
        (None, None, None) => request,
    };

    if let Some(keywords) = params.keywords {
        request = request.keywords(split_list(&keywords));
    }
    if let Some(genres) = params.genres {
        request = request.genres(split_list(&genres));
    }
    if let Some(title) = params.title {
        request = request.filter(ProgramAttr::Title, Filter::eq(title));
    }
    if let Some(category) = params.category {
        request = request.filter(ProgramAttr::Category, Filter::eq(category));
    }
    if let Some(year) = params.year {
        request = request.filter(ProgramAttr::Year, Filter::eq(year));
    }
    if let Some(rating) = params.rating {
        request = request.filter(ProgramAttr::Rating, Filter::eq(rating));
    }
    if let Some(limit) = params.limit {
        request = request.limit(limit);
    }

    Ok(request)
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/programs
///
/// Search programs by channel, time and attribute filters.
pub async fn search_programs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProgramQueryParams>,
) -> Result<Json<ProgramListResponse>, ApiError> {
    debug!(?params, "Program search");
    let request = build_request(&state, params)?;

    let programs = state.guide().search(request).await.map_err(guide_error)?;
    let total = programs.len();
    Ok(Json(ProgramListResponse { programs, total }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_list(" , ").is_empty());
    }
}
