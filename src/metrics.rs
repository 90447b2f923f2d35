use lazy_static::lazy_static;
use prometheus::{
    Counter, Encoder, Gauge, Histogram, TextEncoder, register_counter, register_gauge,
    register_histogram,
};

lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("governor_requests_total", "Total number of governed requests").unwrap();
    pub static ref CACHE_HITS: Counter =
        register_counter!("governor_cache_hits_total", "Total cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("governor_cache_misses_total", "Total cache misses").unwrap();
    pub static ref DEDUPLICATED: Counter = register_counter!(
        "governor_deduplicated_total",
        "Requests that joined an in-flight request for the same key"
    )
    .unwrap();
    pub static ref RATE_LIMITED: Counter = register_counter!(
        "governor_rate_limited_total",
        "Requests rejected by the rate limiter"
    )
    .unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "governor_request_latency_seconds",
        "Latency of executed upstream requests in seconds"
    )
    .unwrap();
    pub static ref CACHE_SIZE: Gauge =
        register_gauge!("governor_cache_size", "Current number of items in cache").unwrap();
    pub static ref BATCH_FLUSHES: Counter =
        register_counter!("governor_batch_flushes_total", "Total batch flushes").unwrap();
    pub static ref BATCH_SIZE: Histogram = register_histogram!(
        "governor_batch_size",
        "Number of requests per batch flush",
        vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]
    )
    .unwrap();
}

pub fn gather_text() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
