use thiserror::Error;

use crate::search::BackendError;

/// Failures surfaced by the [`RulesAgent`](crate::agent::RulesAgent) boundary.
///
/// Generation failures never appear here: they are absorbed by the
/// synthesizer and turned into a fallback answer.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Missing or blank input, rejected before any backend call.
    #[error("{0}")]
    Validation(String),

    /// Unknown article id.
    #[error("article {0} not found")]
    NotFound(String),

    /// The search backend was unreachable or returned an error.
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] BackendError),

    /// A crashed worker or similar fault on our side.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BackendError> for AgentError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Task(msg) => AgentError::Internal(msg),
            other => AgentError::Retrieval(other),
        }
    }
}

/// Invalid or incomplete configuration detected at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid expansion pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to read {path}: {message}")]
    Unreadable { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_every_variable() {
        let err = ConfigError::Missing(vec![
            "ELASTICSEARCH_HOST".to_string(),
            "ELASTICSEARCH_API_KEY".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "missing configuration: ELASTICSEARCH_HOST, ELASTICSEARCH_API_KEY"
        );
    }

    #[test]
    fn test_retrieval_wraps_backend_error() {
        let err: AgentError = BackendError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, AgentError::Retrieval(_)));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_crashed_search_task_is_internal() {
        let err: AgentError = BackendError::Task("task panicked".into()).into();
        assert!(matches!(err, AgentError::Internal(msg) if msg == "task panicked"));
    }
}
