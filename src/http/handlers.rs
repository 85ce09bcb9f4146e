//! Service endpoints: health, version and relay debugging.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::error::RelayError;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Version information endpoint
pub async fn version_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "online",
        "name": "m3u8-restreamer",
        "version": env!("CARGO_PKG_VERSION"),
        "fetch_tool": state.config.fetch.executable,
        "grace_period_secs": state.relay.grace_period().as_secs(),
    }))
}

/// Debug endpoint - running relays and outcome counters
pub async fn active_relays(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.registry.snapshot()))
}

/// Stream or playlist route hit without a target URL
pub async fn missing_target() -> RelayError {
    RelayError::InvalidRequest("missing target URL in path".to_string())
}
