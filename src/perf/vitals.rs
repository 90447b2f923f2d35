use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entryType", rename_all = "kebab-case")]
pub enum PerformanceEntry {
    #[serde(rename_all = "camelCase")]
    Navigation {
        request_start: f64,
        response_start: f64,
    },
    #[serde(rename_all = "camelCase")]
    Paint { name: String, start_time: f64 },
    #[serde(rename_all = "camelCase")]
    LayoutShift {
        value: f64,
        #[serde(default)]
        had_recent_input: bool,
    },
    #[serde(rename_all = "camelCase")]
    LargestContentfulPaint { start_time: f64 },
    #[serde(rename_all = "camelCase")]
    FirstInput {
        start_time: f64,
        processing_start: f64,
    },
}

// milliseconds except for CLS
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebVitals {
    pub fcp: Option<f64>,
    pub lcp: Option<f64>,
    pub fid: Option<f64>,
    pub cls: f64,
    pub ttfb: Option<f64>,
}

impl WebVitals {
    // last value wins, except CLS which accumulates
    pub fn record(&mut self, entry: &PerformanceEntry) {
        match entry {
            PerformanceEntry::Navigation {
                request_start,
                response_start,
            } => self.ttfb = Some(response_start - request_start),
            PerformanceEntry::Paint { name, start_time } => {
                if name == "first-contentful-paint" {
                    self.fcp = Some(*start_time);
                }
            }
            PerformanceEntry::LayoutShift {
                value,
                had_recent_input,
            } => {
                if !had_recent_input {
                    self.cls += value;
                }
            }
            PerformanceEntry::LargestContentfulPaint { start_time } => {
                self.lcp = Some(*start_time)
            }
            PerformanceEntry::FirstInput {
                start_time,
                processing_start,
            } => self.fid = Some(processing_start - start_time),
        }
    }
}
