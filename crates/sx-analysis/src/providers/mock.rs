//! Scripted backend for tests.

use crate::backend::{AnalysisBackend, BackendError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

enum Behavior {
    Succeed(String),
    Fail(String),
    Slow(Duration),
}

/// A backend with a fixed scripted behavior, plus a call counter so tests
/// can assert that no configured backend was skipped.
pub struct MockBackend {
    name: String,
    behavior: Behavior,
    calls: AtomicU64,
}

impl MockBackend {
    /// Always returns the given response.
    pub fn succeeding(name: &str, response: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: Behavior::Succeed(response.to_string()),
            calls: AtomicU64::new(0),
        }
    }

    /// Always fails with an unavailability error.
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            behavior: Behavior::Fail(format!("backend '{}' is degraded", name)),
            calls: AtomicU64::new(0),
        }
    }

    /// Sleeps for the given duration before answering; used to exercise
    /// stage timeouts.
    pub fn slow(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            behavior: Behavior::Slow(delay),
            calls: AtomicU64::new(0),
        }
    }

    /// How many times `complete` was invoked.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, _prompt: &str) -> Result<String, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Succeed(text) => Ok(text.clone()),
            Behavior::Fail(reason) => Err(BackendError::Unavailable(reason.clone())),
            Behavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("late response".to_string())
            }
        }
    }
}
