//! # sx-sentry
//!
//! Host-side threat detection for Sentinel X.
//!
//! The sentry polls the live process table on a fixed cadence, matches
//! command lines against an ordered signature table, and hands each newly
//! observed match to the threat queue exactly once. No OS event hooks are
//! used; detection is pure polling.

pub mod detector;
pub mod scanner;
pub mod signatures;

pub use detector::{Detector, DetectorConfig, DetectorHandle};
pub use scanner::{MockScanner, ProcessRecord, ProcessScanner, ScanError, SysinfoScanner};
pub use signatures::{Signature, SignatureTable};
