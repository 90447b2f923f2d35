use std::sync::Arc;
use thiserror::Error;

// `E` is the caller's own request error, carried through untouched
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GovernorError<E> {
    #[error("Rate limit exceeded for key: {key}")]
    RateLimitExceeded { key: String },

    #[error("{0}")]
    Request(E),

    // request task panicked or was torn down by the runtime
    #[error("Request task aborted: {0}")]
    Aborted(String),
}

impl<E> GovernorError<E> {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GovernorError::RateLimitExceeded { .. })
    }
}

#[derive(Debug, Error)]
pub enum BatchError<E> {
    #[error("Batch failed: {0}")]
    Failed(Arc<E>),

    #[error("Batch returned {actual} results for {expected} requests")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("Batch was dropped before it replied")]
    Dropped,
}

// Clone so deduplicated callers can share one
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse Error: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}
