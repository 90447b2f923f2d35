use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::perf::{PerformanceEntry, PerformanceReport};
use crate::state::AppState;

// Clients post either a single observer entry or a buffered list of them
#[derive(Deserialize)]
#[serde(untagged)]
pub enum EntryBatch {
    One(PerformanceEntry),
    Many(Vec<PerformanceEntry>),
}

impl EntryBatch {
    fn into_entries(self) -> Vec<PerformanceEntry> {
        match self {
            EntryBatch::One(entry) => vec![entry],
            EntryBatch::Many(entries) => entries,
        }
    }
}

pub async fn report_handler(State(state): State<Arc<AppState>>) -> Json<PerformanceReport> {
    Json(state.monitor.generate_report())
}

pub async fn entries_handler(
    State(state): State<Arc<AppState>>,
    Json(batch): Json<EntryBatch>,
) -> Json<Value> {
    let entries = batch.into_entries();
    for entry in &entries {
        state.monitor.observe(entry);
    }
    Json(json!({ "recorded": entries.len() }))
}
