mod cache;
mod error;
mod health;
mod metrics;
mod performance;
mod volunteer;

pub use cache::clear_cache_handler;
pub use error::GatewayError;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use performance::{entries_handler, report_handler};
pub use volunteer::{profile_handler, proxy_handler};

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/v1/volunteer/{*path}", get(proxy_handler))
        .route("/batch/profiles/{id}", get(profile_handler))
        .route("/performance", get(report_handler))
        .route("/performance/entries", post(entries_handler))
        .route("/cache", delete(clear_cache_handler))
        .with_state(state)
}
