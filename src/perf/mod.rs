mod frames;
mod memory;
mod report;
mod vitals;

pub use frames::{FPS_SAMPLE_WINDOW, FpsTracker};
pub use memory::ProcessMemory;
pub use report::{PerformanceMetrics, PerformanceReport, score};
pub use vitals::{PerformanceEntry, WebVitals};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::task::BackgroundTask;

#[derive(Default)]
struct MonitorState {
    metrics: PerformanceMetrics,
    frames: FpsTracker,
    vitals: WebVitals,
}

// one per process, built by the composition root
#[derive(Default)]
pub struct PerformanceMonitor {
    state: Mutex<MonitorState>,
    // created on the first memory sample, kept across cleanup
    memory: Mutex<Option<ProcessMemory>>,
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1_000.0
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        // every writer leaves the state consistent, so a poisoned lock is usable
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn measure_render(&self, label: &str, start: Instant) -> Duration {
        let elapsed = start.elapsed();
        self.state().metrics.render_time_ms = millis(elapsed);
        debug!(label, elapsed_ms = millis(elapsed), "render measured");
        elapsed
    }

    pub fn measure_update(&self, label: &str, start: Instant) -> Duration {
        let elapsed = start.elapsed();
        self.state().metrics.update_time_ms = millis(elapsed);
        debug!(label, elapsed_ms = millis(elapsed), "update measured");
        elapsed
    }

    pub fn measure_interaction(&self, label: &str, start: Instant) -> Duration {
        let elapsed = start.elapsed();
        self.state().metrics.interaction_time_ms = millis(elapsed);
        debug!(label, elapsed_ms = millis(elapsed), "interaction measured");
        elapsed
    }

    /// Samples the process's resident memory in MB. `None` when the platform
    /// does not expose it; the last reading is then kept.
    pub fn update_memory_usage(&self) -> Option<f64> {
        let bytes = {
            let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
            if memory.is_none() {
                *memory = ProcessMemory::new();
            }
            memory.as_mut()?.resident_bytes()?
        };
        Some(self.record_memory_usage(bytes))
    }

    // heap size reported from elsewhere, returned in MB
    pub fn record_memory_usage(&self, bytes: u64) -> f64 {
        let mb = memory::bytes_to_mb(bytes);
        self.state().metrics.memory_usage_mb = Some(mb);
        mb
    }

    // one GET of a small cacheable resource
    pub async fn measure_network_latency(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<Duration, reqwest::Error> {
        let start = Instant::now();
        client.get(url).send().await?.error_for_status()?.bytes().await?;
        let elapsed = start.elapsed();
        self.state().metrics.network_latency_ms = Some(millis(elapsed));
        debug!(url, latency_ms = millis(elapsed), "network latency measured");
        Ok(elapsed)
    }

    pub fn record_frame(&self, now: Instant) -> Option<f64> {
        self.state().frames.record_frame(now)
    }

    pub fn fps(&self) -> Option<f64> {
        self.state().frames.average()
    }

    pub fn observe(&self, entry: &PerformanceEntry) {
        self.state().vitals.record(entry);
    }

    pub fn web_vitals(&self) -> WebVitals {
        self.state().vitals.clone()
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let state = self.state();
        PerformanceMetrics {
            fps: state.frames.average(),
            ..state.metrics.clone()
        }
    }

    pub fn generate_report(&self) -> PerformanceReport {
        let report = PerformanceReport::new(self.metrics(), self.web_vitals());
        if !report.recommendations.is_empty() {
            debug!(score = report.score, "performance report has recommendations");
        }
        report
    }

    pub fn cleanup(&self) {
        *self.state() = MonitorState::default();
        info!("performance monitor reset");
    }

    /// Records a frame every `period`, stamped with the time it actually ran,
    /// so a stalled runtime shows up as a lower frame rate.
    pub fn start_frame_loop(self: &Arc<Self>, period: Duration) -> BackgroundTask {
        let monitor = Arc::clone(self);
        BackgroundTask::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                monitor.record_frame(Instant::now());
            }
        })
    }

    pub fn start_probe_loop(
        self: &Arc<Self>,
        client: reqwest::Client,
        url: String,
        every: Duration,
    ) -> BackgroundTask {
        let monitor = Arc::clone(self);
        BackgroundTask::spawn(async move {
            let mut ticker = interval(every);
            info!("Probe loop started (interval: {:?}, url: {})", every, url);
            loop {
                ticker.tick().await;
                monitor.update_memory_usage();
                if let Err(e) = monitor.measure_network_latency(&client, &url).await {
                    warn!(url = %url, error = %e, "latency probe failed");
                }
            }
        })
    }
}
