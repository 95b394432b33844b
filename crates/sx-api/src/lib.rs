//! # sx-api
//!
//! The HTTP surface for Sentinel X: push-based telemetry ingest, queue
//! and case inspection, and the human approve/deny decision endpoint.
//! The on-screen console is an external collaborator; this crate only
//! serves it JSON.

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

#[cfg(test)]
mod test_helpers;

pub use error::ApiError;
pub use state::AppState;

use axum::Router;
use tower_http::trace::TraceLayer;

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    routes::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds and serves the API until the process shuts down.
pub async fn serve(addr: std::net::SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "API listening");
    axum::serve(listener, router(state)).await
}
