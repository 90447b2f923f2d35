use axum::{
    Json,
    extract::{Path, RawQuery, State},
    http::HeaderValue,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::time::Instant;

use crate::cache::make_cache_key;
use crate::handlers::GatewayError;
use crate::state::AppState;

pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const PROFILE_BATCH_KEY: &str = "profiles";

// Governed GET against the volunteer API: cached, deduplicated, rate limited
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Response, GatewayError> {
    let start = Instant::now();

    let path_and_query = match query {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    let key = make_cache_key("GET", &path_and_query);

    let client = state.client.clone();
    let target = path_and_query.clone();
    let result = state
        .governor
        .execute_request(
            &key,
            move || async move { client.get_json(&target).await },
            &state.request_config,
        )
        .await;

    state.monitor.measure_interaction(&path_and_query, start);
    let remaining = state.governor.remaining(&key, &state.request_config);

    let mut response = Json(result?).into_response();
    response
        .headers_mut()
        .insert(RATE_LIMIT_REMAINING, HeaderValue::from(remaining));
    Ok(response)
}

// Profile lookups arriving together go upstream as one batch call
pub async fn profile_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, GatewayError> {
    let client = state.client.clone();
    let profile = state
        .batcher
        .batch_request(PROFILE_BATCH_KEY, id, move |ids: Vec<String>| async move {
            client
                .post_json::<_, Vec<Value>>("profiles/batch", &json!({ "ids": ids }))
                .await
        })
        .await?;
    Ok(Json(profile))
}
