use serde_json::Value;
use std::sync::Arc;

use crate::batcher::Batcher;
use crate::client::VolunteerClient;
use crate::error::ApiError;
use crate::executor::{RequestConfig, RequestGovernor};
use crate::perf::PerformanceMonitor;

// app's shared state
pub struct AppState {
    pub client: VolunteerClient,
    pub governor: RequestGovernor<Value, ApiError>,
    pub request_config: RequestConfig,
    pub batcher: Batcher<String, Value, ApiError>,
    pub monitor: Arc<PerformanceMonitor>,
}
