use axum::{http::StatusCode, response::IntoResponse};
use tracing::error;

use crate::metrics::gather_text;

pub async fn metrics_handler() -> impl IntoResponse {
    match gather_text() {
        Ok(text) => (StatusCode::OK, text),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}
