use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::{ApiError, BatchError, GovernorError};

#[derive(Debug)]
pub enum GatewayError {
    Governor(GovernorError<ApiError>),
    Batch(BatchError<ApiError>),
}

impl From<GovernorError<ApiError>> for GatewayError {
    fn from(err: GovernorError<ApiError>) -> Self {
        GatewayError::Governor(err)
    }
}

impl From<BatchError<ApiError>> for GatewayError {
    fn from(err: BatchError<ApiError>) -> Self {
        GatewayError::Batch(err)
    }
}

fn upstream_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::Status { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        ApiError::Transport(_) | ApiError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Governor(GovernorError::RateLimitExceeded { .. }) => {
                StatusCode::TOO_MANY_REQUESTS
            }
            GatewayError::Governor(GovernorError::Request(e)) => upstream_status(e),
            GatewayError::Governor(GovernorError::Aborted(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Batch(BatchError::Failed(e)) => upstream_status(e),
            GatewayError::Batch(BatchError::ResultCountMismatch { .. }) => StatusCode::BAD_GATEWAY,
            GatewayError::Batch(BatchError::Dropped) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            GatewayError::Governor(e) => e.to_string(),
            GatewayError::Batch(e) => e.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
