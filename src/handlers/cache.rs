use axum::{extract::State, http::StatusCode};
use std::sync::Arc;

use crate::state::AppState;

// Route change / logout hook: forget everything cached and sampled so far
pub async fn clear_cache_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    state.governor.clear_cache();
    state.monitor.cleanup();
    StatusCode::NO_CONTENT
}
