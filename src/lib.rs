pub mod batcher;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod handlers;
pub mod metrics;
pub mod pending;
pub mod perf;
pub mod rate_limit;
pub mod state;
pub mod task;

pub use batcher::Batcher;
pub use cache::Cache;
pub use error::{ApiError, BatchError, GovernorError};
pub use executor::{GovernorSettings, RequestConfig, RequestGovernor};
pub use perf::PerformanceMonitor;
pub use rate_limit::{RateLimitConfig, RequestCounter};

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing subscriber.
/// Uses RUST_LOG env var for filtering (defaults to info).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
