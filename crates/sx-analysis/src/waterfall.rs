//! The waterfall fallback protocol.
//!
//! A stage holds an ordered list of backends, each with its own fixed
//! timeout. `waterfall` tries them strictly in order — the order encodes a
//! cost/quality preference, so attempts are sequential, never raced — and
//! returns the first non-empty response. Every failed attempt is recorded;
//! no configured backend is ever skipped. Exhausting the list yields a
//! typed failure carrying the last backend's failure message.

use crate::backend::AnalysisBackend;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One backend slot in a stage's priority order.
pub struct StageEntry {
    pub backend: Arc<dyn AnalysisBackend>,
    /// Fixed per-call timeout for this backend.
    pub timeout: Duration,
}

/// Record of one failed backend attempt.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub backend: String,
    pub reason: String,
}

/// A successful stage invocation.
#[derive(Debug, Clone)]
pub struct StageSuccess {
    /// Backend that produced the response.
    pub backend: String,
    /// Raw response text, non-empty.
    pub text: String,
    /// Failures accumulated before the successful attempt.
    pub failures: Vec<BackendFailure>,
}

/// All configured backends failed.
#[derive(Debug, Error)]
#[error("stage '{stage}' exhausted all {attempts} backends; last failure: {last}")]
pub struct StageExhausted {
    pub stage: String,
    pub attempts: usize,
    /// Failure message of the last backend tried.
    pub last: String,
    /// Every recorded failure, in attempt order.
    pub failures: Vec<BackendFailure>,
}

/// An ordered list of backends for one pipeline stage.
pub struct Stage {
    name: String,
    entries: Vec<StageEntry>,
}

impl Stage {
    /// Creates an empty stage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Appends a backend at the lowest remaining priority.
    pub fn push_backend(mut self, backend: Arc<dyn AnalysisBackend>, timeout: Duration) -> Self {
        self.entries.push(StageEntry { backend, timeout });
        self
    }

    /// Stage name, used in logs and exhaustion errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of configured backends.
    pub fn backend_count(&self) -> usize {
        self.entries.len()
    }

    /// Runs the waterfall protocol over the configured backends.
    ///
    /// A backend succeeds if it returns a non-empty response within its
    /// timeout and without erroring. Failures never short-circuit the
    /// remaining backends.
    pub async fn waterfall(&self, prompt: &str) -> Result<StageSuccess, StageExhausted> {
        let mut failures: Vec<BackendFailure> = Vec::new();

        for entry in &self.entries {
            let name = entry.backend.name().to_string();
            debug!(stage = %self.name, backend = %name, "Trying backend");

            let attempt = tokio::time::timeout(entry.timeout, entry.backend.complete(prompt)).await;
            let reason = match attempt {
                Ok(Ok(text)) => {
                    if text.trim().is_empty() {
                        "backend returned an empty response".to_string()
                    } else {
                        info!(
                            stage = %self.name,
                            backend = %name,
                            prior_failures = failures.len(),
                            "Stage succeeded"
                        );
                        return Ok(StageSuccess {
                            backend: name,
                            text,
                            failures,
                        });
                    }
                }
                Ok(Err(err)) => err.to_string(),
                Err(_) => format!("timed out after {:?}", entry.timeout),
            };

            warn!(stage = %self.name, backend = %name, reason = %reason, "Backend failed");
            failures.push(BackendFailure {
                backend: name,
                reason,
            });
        }

        let last = failures
            .last()
            .map(|f| f.reason.clone())
            .unwrap_or_else(|| "no backends configured".to_string());

        Err(StageExhausted {
            stage: self.name.clone(),
            attempts: self.entries.len(),
            last,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockBackend;

    fn timeout() -> Duration {
        Duration::from_millis(200)
    }

    #[tokio::test]
    async fn test_first_backend_success_short_circuits_nothing_before_it() {
        let stage = Stage::new("analyst")
            .push_backend(Arc::new(MockBackend::succeeding("fast", "report")), timeout());

        let success = stage.waterfall("prompt").await.unwrap();
        assert_eq!(success.backend, "fast");
        assert_eq!(success.text, "report");
        assert!(success.failures.is_empty());
    }

    #[tokio::test]
    async fn test_falls_through_k_failures_to_backend_k_plus_one() {
        let stage = Stage::new("analyst")
            .push_backend(Arc::new(MockBackend::failing("one")), timeout())
            .push_backend(Arc::new(MockBackend::failing("two")), timeout())
            .push_backend(Arc::new(MockBackend::succeeding("three", "ok")), timeout());

        let success = stage.waterfall("prompt").await.unwrap();
        assert_eq!(success.backend, "three");
        // Exactly k failures recorded, in attempt order, none skipped.
        assert_eq!(success.failures.len(), 2);
        assert_eq!(success.failures[0].backend, "one");
        assert_eq!(success.failures[1].backend, "two");
    }

    #[tokio::test]
    async fn test_empty_response_counts_as_failure() {
        let stage = Stage::new("analyst")
            .push_backend(Arc::new(MockBackend::succeeding("empty", "   ")), timeout())
            .push_backend(Arc::new(MockBackend::succeeding("real", "text")), timeout());

        let success = stage.waterfall("prompt").await.unwrap();
        assert_eq!(success.backend, "real");
        assert_eq!(success.failures.len(), 1);
        assert!(success.failures[0].reason.contains("empty"));
    }

    #[tokio::test]
    async fn test_slow_backend_times_out_and_falls_through() {
        let stage = Stage::new("expert")
            .push_backend(
                Arc::new(MockBackend::slow("sluggish", Duration::from_secs(5))),
                Duration::from_millis(20),
            )
            .push_backend(Arc::new(MockBackend::succeeding("backup", "plan")), timeout());

        let success = stage.waterfall("prompt").await.unwrap();
        assert_eq!(success.backend, "backup");
        assert!(success.failures[0].reason.contains("timed out"));
    }

    #[tokio::test]
    async fn test_exhaustion_is_typed_and_carries_last_failure() {
        let stage = Stage::new("expert")
            .push_backend(Arc::new(MockBackend::failing("one")), timeout())
            .push_backend(Arc::new(MockBackend::failing("two")), timeout());

        let err = stage.waterfall("prompt").await.unwrap_err();
        assert_eq!(err.stage, "expert");
        assert_eq!(err.attempts, 2);
        assert_eq!(err.failures.len(), 2);
        // Last backend's failure message is surfaced.
        assert_eq!(err.failures.last().unwrap().backend, "two");
        assert!(err.last.contains("unavailable") || !err.last.is_empty());
    }

    #[tokio::test]
    async fn test_empty_stage_exhausts_immediately() {
        let stage = Stage::new("expert");
        let err = stage.waterfall("prompt").await.unwrap_err();
        assert_eq!(err.attempts, 0);
        assert_eq!(err.last, "no backends configured");
    }
}
