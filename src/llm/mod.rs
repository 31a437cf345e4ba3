//! Text generation seam.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sampling parameters sent with every generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 2048,
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out")]
    Timeout,

    /// Quota exhausted or rate limited.
    #[error("generation throttled ({status})")]
    Throttled { status: u16 },

    #[error("generation backend returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("malformed generation response: {0}")]
    Malformed(String),

    #[error("generation returned no text")]
    Empty,

    #[error("generation transport error: {0}")]
    Transport(String),

    #[error("generation backend not configured: {0}")]
    Unconfigured(String),
}

impl GenerationError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Timeout | GenerationError::Throttled { .. } => true,
            GenerationError::Http { status, .. } => *status >= 500,
            GenerationError::Transport(_) => true,
            GenerationError::Malformed(_)
            | GenerationError::Empty
            | GenerationError::Unconfigured(_) => false,
        }
    }
}

#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for `prompt`. Never returns blank text on success.
    async fn generate_content(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_low_randomness() {
        let params = GenerationParams::default();
        assert!(params.temperature <= 0.3);
        assert_eq!(params.max_output_tokens, 2048);
    }

    #[test]
    fn test_transient_classification() {
        assert!(GenerationError::Timeout.is_transient());
        assert!(GenerationError::Throttled { status: 429 }.is_transient());
        assert!(GenerationError::Http {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(!GenerationError::Http {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!GenerationError::Empty.is_transient());
        assert!(!GenerationError::Malformed("x".into()).is_transient());
    }
}
