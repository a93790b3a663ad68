//! REST API handlers

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::state::AppState;

/// Current session phase and the rows awaiting registration
pub async fn get_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (phase, devices) = state.snapshot().await;
    Json(serde_json::json!({
        "phase": phase,
        "devices": devices,
    }))
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.config.clone())
}
