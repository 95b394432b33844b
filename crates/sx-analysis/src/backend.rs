//! Analysis backend trait definition.
//!
//! A backend wraps one external analysis service behind a uniform
//! prompt-in, text-out call. Timeouts are owned by the stage, not the
//! backend; a backend only reports its own failures.

use async_trait::async_trait;
use thiserror::Error;

/// Errors a backend can report.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// One external analysis service.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Stable name used in logs, failure records, and `generated_by`.
    fn name(&self) -> &str;

    /// Sends the prompt and returns the raw text response.
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}
