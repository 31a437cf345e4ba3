use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::api::error_response;
use crate::models::{RuleDocument, Stats};
use crate::state::AppState;

/// GET /api/article/{articleNumber}
pub async fn get_article(
    State(state): State<AppState>,
    Path(article): Path<String>,
) -> Result<Json<RuleDocument>, (StatusCode, String)> {
    state
        .agent
        .get_article(&article)
        .await
        .map(Json)
        .map_err(|e| error_response(e, "Failed to get article"))
}

/// GET /api/stats
pub async fn stats(
    State(state): State<AppState>,
) -> Result<Json<Stats>, (StatusCode, String)> {
    state
        .agent
        .get_stats()
        .await
        .map(Json)
        .map_err(|e| error_response(e, "Failed to get stats"))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.agent.health().await {
        (
            StatusCode::OK,
            Json(json!({ "status": "ok", "search": "connected" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "message": "Search backend unreachable" })),
        )
    }
}
