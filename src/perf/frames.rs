use std::collections::VecDeque;
use tokio::time::Instant;

pub const FPS_SAMPLE_WINDOW: usize = 60;

#[derive(Debug, Default)]
pub struct FpsTracker {
    samples: VecDeque<f64>,
    last_frame: Option<Instant>,
}

impl FpsTracker {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(FPS_SAMPLE_WINDOW),
            last_frame: None,
        }
    }

    // first frame only sets the reference
    pub fn record_frame(&mut self, now: Instant) -> Option<f64> {
        let previous = self.last_frame.replace(now)?;
        let delta = now.checked_duration_since(previous)?;
        if delta.is_zero() {
            return None;
        }
        let fps = 1.0 / delta.as_secs_f64();
        self.push_sample(fps);
        Some(fps)
    }

    pub fn push_sample(&mut self, fps: f64) {
        if self.samples.len() == FPS_SAMPLE_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(fps);
    }

    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.last_frame = None;
    }
}
