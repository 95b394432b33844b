//! Liveness probe.

use crate::dto::HealthResponse;
use crate::state::AppState;
use axum::{extract::State, Json};

/// Reports process liveness plus the two load indicators the console
/// polls most often.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        queue_depth: state.queue.len(),
        case_count: state.store.len().await,
    })
}
