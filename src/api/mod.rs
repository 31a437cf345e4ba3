//! Axum handlers. Each one unpacks the request, calls the agent and maps
//! [`AgentError`] onto a status code.

pub mod agent;
pub mod articles;
pub mod search;

use axum::http::StatusCode;

use crate::error::AgentError;

/// Validation and not-found messages are returned as-is; anything else is
/// logged and replaced by `generic`.
pub(crate) fn error_response(err: AgentError, generic: &str) -> (StatusCode, String) {
    match err {
        AgentError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
        AgentError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        AgentError::Retrieval(_) | AgentError::Internal(_) => {
            tracing::error!("{generic}: {err}");
            (StatusCode::INTERNAL_SERVER_ERROR, generic.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::BackendError;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let (status, body) =
            error_response(AgentError::Validation("Question required".into()), "Agent failed");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Question required");
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let (status, body) = error_response(AgentError::NotFound("99.9".into()), "x");
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "article 99.9 not found");
    }

    #[test]
    fn test_backend_details_are_not_leaked() {
        let err = AgentError::Retrieval(BackendError::Status {
            status: 500,
            body: "shard failure at node-3".into(),
        });
        let (status, body) = error_response(err, "Search failed");
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Search failed");
    }
}
