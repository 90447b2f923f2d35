use clap::Parser;
use std::time::Duration;

use crate::executor::{GovernorSettings, RequestConfig};

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "request-governor")]
#[command(about = "Rate-limiting, caching and batching sidecar for the volunteer API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "GOVERNOR_PORT", default_value_t = 8080)]
    pub port: u16,

    // Volunteer API base url
    #[arg(short, long, env = "VOLUNTEER_API_URL", default_value = "localhost:3000")]
    pub upstream: String,

    // Bearer token sent upstream
    #[arg(long, env = "VOLUNTEER_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    // Cache TTL in seconds
    #[arg(short, long, env = "GOVERNOR_CACHE_TTL", default_value_t = 300)]
    pub cache_ttl: u64,

    // Rate limit max requests per window
    #[arg(long, env = "GOVERNOR_RATE_LIMIT", default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, env = "GOVERNOR_RATE_WINDOW", default_value_t = 60)]
    pub rate_window: u64,

    // Batch flush delay in milliseconds
    #[arg(long, env = "GOVERNOR_BATCH_DELAY_MS", default_value_t = 100)]
    pub batch_delay_ms: u64,

    // Stale entry sweep interval in seconds
    #[arg(long, env = "GOVERNOR_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Entries older than this many seconds are swept
    #[arg(long, env = "GOVERNOR_SWEEP_MAX_AGE", default_value_t = 3600)]
    pub sweep_max_age: u64,

    // Frame sampling period in milliseconds
    #[arg(long, env = "GOVERNOR_FRAME_INTERVAL_MS", default_value_t = 16)]
    pub frame_interval_ms: u64,

    // Memory and latency probe interval in seconds
    #[arg(long, env = "GOVERNOR_PROBE_INTERVAL", default_value_t = 30)]
    pub probe_interval: u64,

    // Small cacheable upstream resource used for latency probes
    #[arg(long, env = "GOVERNOR_PROBE_PATH", default_value = "/favicon.ico")]
    pub probe_path: String,
}

impl Args {
    pub fn request_config(&self) -> RequestConfig {
        RequestConfig {
            max_requests: self.rate_limit,
            window: Duration::from_secs(self.rate_window),
            cache_ttl: Duration::from_secs(self.cache_ttl),
        }
    }

    pub fn governor_settings(&self) -> GovernorSettings {
        GovernorSettings {
            default_config: self.request_config(),
            sweep_interval: Duration::from_secs(self.sweep_interval),
            sweep_max_age: Duration::from_secs(self.sweep_max_age),
        }
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval)
    }
}
