use thiserror::Error;

use crate::services::BackendError;

/// Errors that end one orchestration flow
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("failed to resolve match {match_id}: {reason}")]
    Resolution { match_id: String, reason: String },

    #[error("failed to encode request: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("flow cancelled by shutdown")]
    Cancelled,

    /// Still running when the shutdown grace period ran out
    #[error("flow aborted at shutdown")]
    Aborted,
}

impl From<BackendError> for FlowError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Request(e) => FlowError::Transport(e.to_string()),
            BackendError::InvalidResponse(msg) => FlowError::MalformedResponse(msg),
            other @ (BackendError::Api { .. } | BackendError::Unauthorized) => FlowError::Backend(other.to_string()),
        }
    }
}
