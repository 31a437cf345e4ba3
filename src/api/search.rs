use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error_response;
use crate::models::{SearchRequest, SearchResponse};
use crate::state::AppState;

/// POST /api/search/rules - Fuzzy keyword search over rule content and
/// titles, with `<mark>` highlights.
pub async fn search_rules(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = req.query.as_deref().unwrap_or_default();

    state
        .agent
        .search(query, req.max_results)
        .await
        .map(Json)
        .map_err(|e| error_response(e, "Search failed"))
}
