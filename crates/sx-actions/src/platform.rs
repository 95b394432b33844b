//! OS remediation primitive boundaries.
//!
//! Each trait is the seam to one concrete OS capability. Process
//! termination has a real implementation; the remaining primitives ship
//! as simulated implementations that log what they would do and report
//! success, and are swapped for real integrations per deployment.

use async_trait::async_trait;
use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from remediation primitives.
#[derive(Debug, Clone, Error)]
pub enum PlatformError {
    #[error("target not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Terminates processes by pid.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    async fn kill(&self, pid: u32) -> Result<(), PlatformError>;
}

/// Moves files into quarantine.
#[async_trait]
pub trait FileQuarantine: Send + Sync {
    async fn quarantine(&self, path: &str) -> Result<(), PlatformError>;
}

/// Removes autorun/service persistence entries.
#[async_trait]
pub trait PersistenceControl: Send + Sync {
    async fn remove(&self, location: &str) -> Result<(), PlatformError>;
}

/// Blocks remote addresses at the host firewall.
#[async_trait]
pub trait NetworkControl: Send + Sync {
    async fn block(&self, address: &str) -> Result<(), PlatformError>;
}

/// Isolates a host from the network.
#[async_trait]
pub trait HostIsolation: Send + Sync {
    async fn isolate(&self, hostname: &str) -> Result<(), PlatformError>;
}

/// Disables accounts and forces credential resets.
#[async_trait]
pub trait AccountControl: Send + Sync {
    async fn disable(&self, username: &str) -> Result<(), PlatformError>;
    async fn reset_password(&self, username: &str) -> Result<(), PlatformError>;
}

/// Real process termination backed by sysinfo.
pub struct SysinfoProcessControl;

#[async_trait]
impl ProcessControl for SysinfoProcessControl {
    async fn kill(&self, pid: u32) -> Result<(), PlatformError> {
        let system = System::new_with_specifics(
            RefreshKind::new().with_processes(ProcessRefreshKind::new()),
        );
        match system.process(Pid::from_u32(pid)) {
            Some(process) => {
                if process.kill() {
                    info!(pid, "Terminated process");
                    Ok(())
                } else {
                    warn!(pid, "Kill signal was not delivered");
                    Err(PlatformError::AccessDenied(format!(
                        "kill signal for pid {} was not delivered",
                        pid
                    )))
                }
            }
            None => Err(PlatformError::NotFound(format!(
                "no live process with pid {}",
                pid
            ))),
        }
    }
}

/// Simulated implementation of every non-process primitive. Logs the
/// would-be effect and reports success.
pub struct SimulatedPlatform;

#[async_trait]
impl FileQuarantine for SimulatedPlatform {
    async fn quarantine(&self, path: &str) -> Result<(), PlatformError> {
        info!(path, "Simulated: would quarantine file");
        Ok(())
    }
}

#[async_trait]
impl PersistenceControl for SimulatedPlatform {
    async fn remove(&self, location: &str) -> Result<(), PlatformError> {
        info!(location, "Simulated: would remove persistence entry");
        Ok(())
    }
}

#[async_trait]
impl NetworkControl for SimulatedPlatform {
    async fn block(&self, address: &str) -> Result<(), PlatformError> {
        info!(address, "Simulated: would block address");
        Ok(())
    }
}

#[async_trait]
impl HostIsolation for SimulatedPlatform {
    async fn isolate(&self, hostname: &str) -> Result<(), PlatformError> {
        info!(hostname, "Simulated: would isolate host");
        Ok(())
    }
}

#[async_trait]
impl AccountControl for SimulatedPlatform {
    async fn disable(&self, username: &str) -> Result<(), PlatformError> {
        info!(username, "Simulated: would disable account");
        Ok(())
    }

    async fn reset_password(&self, username: &str) -> Result<(), PlatformError> {
        info!(username, "Simulated: would force password reset");
        Ok(())
    }
}
