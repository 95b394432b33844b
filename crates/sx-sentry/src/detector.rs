//! The sentry polling loop.
//!
//! Scans the process table on a fixed interval, emits one threat event
//! per newly observed signature match, and hands events to the threat
//! queue. The loop never stops on a per-scan error: transient errors are
//! swallowed, anything else feeds an exponential backoff. Stopping is
//! observed within one poll interval and never drops an already queued
//! event.

use crate::scanner::ProcessScanner;
use crate::signatures::SignatureTable;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use sx_core::ThreatQueue;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Tuning knobs for the detector loop.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// How often to poll the process table.
    pub poll_interval: Duration,
    /// Consecutive non-transient scan errors before backing off.
    pub error_threshold: u32,
    /// Upper bound for a backoff pause.
    pub max_backoff: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            error_threshold: 3,
            max_backoff: Duration::from_secs(5),
        }
    }
}

/// The polling detector. Construct, then [`Detector::spawn`] it.
pub struct Detector {
    scanner: Arc<dyn ProcessScanner>,
    signatures: SignatureTable,
    queue: Arc<ThreatQueue>,
    config: DetectorConfig,
}

/// Handle to a running detector task.
pub struct DetectorHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DetectorHandle {
    /// Signals the loop to stop and waits for it to finish. The stop is
    /// observed within one poll interval.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl Detector {
    /// Creates a detector over the given scanner, signature table and queue.
    pub fn new(
        scanner: Arc<dyn ProcessScanner>,
        signatures: SignatureTable,
        queue: Arc<ThreatQueue>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            scanner,
            signatures,
            queue,
            config,
        }
    }

    /// Starts the polling loop on the tokio runtime.
    pub fn spawn(self) -> DetectorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        DetectorHandle { shutdown_tx, task }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            signatures = self.signatures.len(),
            "Sentry detector started"
        );

        // Process ids already reported this session. Cleared only at
        // restart; PID reuse within a session is an accepted approximation.
        let mut seen: HashSet<u32> = HashSet::new();
        let mut consecutive_errors: u32 = 0;
        let mut backoff_level: u32 = 0;

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.scanner.scan() {
                        Ok(records) => {
                            consecutive_errors = 0;
                            backoff_level = 0;
                            for event in self.signatures.match_processes(&records, &mut seen) {
                                info!(
                                    pid = event.process_id,
                                    signature = %event.signature_id,
                                    kind = %event.kind,
                                    "Threat detected"
                                );
                                self.queue.push(event);
                            }
                        }
                        Err(err) if err.is_transient() => {
                            debug!(error = %err, "Transient scan error, continuing");
                        }
                        Err(err) => {
                            consecutive_errors += 1;
                            warn!(
                                error = %err,
                                consecutive = consecutive_errors,
                                "Scan failed"
                            );
                            if consecutive_errors >= self.config.error_threshold {
                                consecutive_errors = 0;
                                let pause = self.backoff_pause(backoff_level);
                                backoff_level = backoff_level.saturating_add(1);
                                warn!(pause_ms = pause.as_millis() as u64, "Backing off");
                                tokio::select! {
                                    _ = tokio::time::sleep(pause) => {}
                                    _ = shutdown_rx.changed() => {
                                        if *shutdown_rx.borrow() { break; }
                                    }
                                }
                            }
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!(seen = seen.len(), "Sentry detector stopped");
    }

    fn backoff_pause(&self, level: u32) -> Duration {
        let base = self.config.poll_interval.max(Duration::from_millis(1));
        let factor = 2u32.saturating_pow(level.min(16));
        base.saturating_mul(factor).min(self.config.max_backoff)
    }
}
