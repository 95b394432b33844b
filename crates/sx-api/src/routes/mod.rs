//! API routes.

pub mod cases;
pub mod decision;
pub mod health;
pub mod ingest;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;

/// Assembles all route handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ingest", post(ingest::ingest_telemetry))
        .route("/queue", get(cases::queue_status))
        .route("/cases", get(cases::list_cases))
        .route("/cases/:id", get(cases::get_case))
        .route("/cases/:id/decision", post(decision::decide_case))
}
