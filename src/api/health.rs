use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "toolbridge is running",
        "config": {
            "upstream_url": config.upstream_url,
            "sse_capture_enabled": config.sse_log_dir.is_some(),
            "log_level": config.log_level,
        }
    }))
}
