//! # sx-actions
//!
//! Remediation primitives and the signing executor for Sentinel X.
//!
//! Every command in the plan vocabulary has one remediation
//! implementation, registered explicitly at startup in the
//! [`registry::RemediationRegistry`]. The [`executor::PlanExecutor`] is
//! the only component that dispatches actions, and it only ever
//! dispatches from a signed plan on an approved, gate-passing case.

pub mod block_network;
pub mod disable_account;
pub mod executor;
pub mod isolate_host;
pub mod kill_process;
pub mod platform;
pub mod quarantine_file;
pub mod registry;
pub mod remove_persistence;
pub mod reset_password;

pub use executor::{ExecutorError, PlanExecutor};
pub use platform::{
    AccountControl, FileQuarantine, HostIsolation, NetworkControl, PersistenceControl,
    PlatformError, ProcessControl, SimulatedPlatform, SysinfoProcessControl,
};
pub use registry::{Remediation, RemediationError, RemediationRegistry};
