use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::error_response;
use crate::models::{AnswerResult, AskRequest};
use crate::state::AppState;

/// POST /api/agent/ask - Answer a question from the rulebook.
///
/// Generation outages are invisible here: the agent answers with the top
/// rules verbatim (`mode: "fallback"`) instead of failing.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AnswerResult>, (StatusCode, String)> {
    let question = req.question.as_deref().unwrap_or_default();
    tracing::info!("Agent question received: {question}");

    state
        .agent
        .ask(question, req.max_context)
        .await
        .map(Json)
        .map_err(|e| error_response(e, "Agent failed"))
}
