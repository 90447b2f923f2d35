use chrono::{DateTime, Utc};
use serde::Serialize;

use super::vitals::WebVitals;

pub const RENDER_BUDGET_MS: f64 = 16.0;
pub const MEMORY_BUDGET_MB: f64 = 50.0;
pub const MIN_FPS: f64 = 55.0;
pub const LCP_BUDGET_MS: f64 = 2_500.0;
pub const FID_BUDGET_MS: f64 = 100.0;
pub const CLS_BUDGET: f64 = 0.1;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub render_time_ms: f64,
    pub update_time_ms: f64,
    pub interaction_time_ms: f64,
    pub memory_usage_mb: Option<f64>,
    pub fps: Option<f64>,
    pub network_latency_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceReport {
    pub metrics: PerformanceMetrics,
    pub web_vitals: WebVitals,
    pub recommendations: Vec<String>,
    pub score: u32,
    pub generated_at: DateTime<Utc>,
}

impl PerformanceReport {
    pub fn new(metrics: PerformanceMetrics, web_vitals: WebVitals) -> Self {
        let (score, recommendations) = score(&metrics, &web_vitals);
        Self {
            metrics,
            web_vitals,
            recommendations,
            score,
            generated_at: Utc::now(),
        }
    }
}

/// Scores from 100 down, one fixed penalty per violated threshold, and
/// returns a recommendation per violation in check order. Metrics that were
/// never measured are not penalised.
pub fn score(metrics: &PerformanceMetrics, vitals: &WebVitals) -> (u32, Vec<String>) {
    let mut score: i32 = 100;
    let mut recommendations = Vec::new();

    let mut penalise = |violated: bool, penalty: i32, advice: &str| {
        if violated {
            score -= penalty;
            recommendations.push(advice.to_string());
        }
    };

    penalise(
        metrics.render_time_ms > RENDER_BUDGET_MS,
        10,
        "Render time is above 16ms: reduce the work done per render",
    );
    penalise(
        metrics.memory_usage_mb.is_some_and(|mb| mb > MEMORY_BUDGET_MB),
        15,
        "Memory usage is above 50MB: look for leaks and unbounded caches",
    );
    penalise(
        metrics.fps.is_some_and(|fps| fps < MIN_FPS),
        20,
        "Frame rate is below 55 FPS: move heavy work off the main loop",
    );
    penalise(
        vitals.lcp.is_some_and(|lcp| lcp > LCP_BUDGET_MS),
        25,
        "Largest Contentful Paint is above 2.5s: speed up the largest above-the-fold resource",
    );
    penalise(
        vitals.fid.is_some_and(|fid| fid > FID_BUDGET_MS),
        20,
        "First Input Delay is above 100ms: break up long tasks",
    );
    penalise(
        vitals.cls > CLS_BUDGET,
        15,
        "Cumulative Layout Shift is above 0.1: reserve space for late-loading content",
    );

    (score.max(0) as u32, recommendations)
}
