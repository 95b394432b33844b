//! # sx-observability
//!
//! Structured logging and the in-memory audit trail for Sentinel X.

pub mod audit;
pub mod logging;

pub use audit::{AuditEntry, AuditEvent, AuditTrail};
pub use logging::{init_logging, init_logging_with_config, LoggingConfig};
