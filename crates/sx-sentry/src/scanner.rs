//! Process enumeration boundary.
//!
//! The detector only sees [`ProcessRecord`]s through the
//! [`ProcessScanner`] trait; the OS-level enumeration lives behind it.
//! [`SysinfoScanner`] is the production implementation, [`MockScanner`]
//! drives tests.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use sysinfo::{ProcessRefreshKind, RefreshKind, System};
use thiserror::Error;

/// A single live process as seen by one scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessRecord {
    /// OS process id.
    pub pid: u32,
    /// Executable name.
    pub name: String,
    /// Full command line, space-joined. May be empty.
    #[serde(default)]
    pub command_line: String,
}

/// Errors from process enumeration.
#[derive(Debug, Clone, Error)]
pub enum ScanError {
    /// A process disappeared mid-scan. Swallowed by the detector.
    #[error("process vanished during scan: {0}")]
    ProcessVanished(String),

    /// The scanner was refused access to part of the process table.
    /// Swallowed by the detector.
    #[error("access denied during scan: {0}")]
    AccessDenied(String),

    /// Any other enumeration failure. Counts toward the detector's
    /// consecutive-error backoff.
    #[error("process enumeration failed: {0}")]
    Backend(String),
}

impl ScanError {
    /// Whether the detector should swallow this error and keep polling
    /// without counting it.
    pub fn is_transient(&self) -> bool {
        matches!(self, ScanError::ProcessVanished(_) | ScanError::AccessDenied(_))
    }
}

/// Source of live process state.
pub trait ProcessScanner: Send + Sync {
    /// Enumerates the current process table.
    fn scan(&self) -> Result<Vec<ProcessRecord>, ScanError>;
}

/// Production scanner backed by the sysinfo crate.
pub struct SysinfoScanner {
    system: Mutex<System>,
}

impl SysinfoScanner {
    /// Creates a scanner that refreshes only process information.
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );
        Self {
            system: Mutex::new(system),
        }
    }
}

impl Default for SysinfoScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessScanner for SysinfoScanner {
    fn scan(&self) -> Result<Vec<ProcessRecord>, ScanError> {
        let mut system = self
            .system
            .lock()
            .map_err(|e| ScanError::Backend(format!("scanner lock poisoned: {}", e)))?;
        system.refresh_processes();

        Ok(system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                pid: pid.as_u32(),
                name: process.name().to_string(),
                command_line: process.cmd().join(" "),
            })
            .collect())
    }
}

/// Scripted scanner for tests: yields queued results in order, then
/// repeats the last one.
pub struct MockScanner {
    results: Mutex<VecDeque<Result<Vec<ProcessRecord>, ScanError>>>,
    last: Mutex<Result<Vec<ProcessRecord>, ScanError>>,
}

impl MockScanner {
    /// Creates a mock that returns an empty process table.
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            last: Mutex::new(Ok(Vec::new())),
        }
    }

    /// Creates a mock that always returns the given table.
    pub fn with_processes(records: Vec<ProcessRecord>) -> Self {
        let scanner = Self::new();
        *scanner.last.lock().unwrap() = Ok(records);
        scanner
    }

    /// Queues one scan result to be returned before the steady state.
    pub fn push_result(&self, result: Result<Vec<ProcessRecord>, ScanError>) {
        self.results.lock().unwrap().push_back(result);
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessScanner for MockScanner {
    fn scan(&self) -> Result<Vec<ProcessRecord>, ScanError> {
        if let Some(result) = self.results.lock().unwrap().pop_front() {
            *self.last.lock().unwrap() = result.clone();
            return result;
        }
        self.last.lock().unwrap().clone()
    }
}
