//! Remediation trait and the explicit registry.
//!
//! One [`Remediation`] implementation exists per command in the closed
//! vocabulary. The registry is built explicitly at startup — there is no
//! dynamic discovery — and the executor looks implementations up by
//! command. An action whose command has no registered implementation is
//! reported as skipped, never silently dropped.

use crate::platform::{
    AccountControl, FileQuarantine, HostIsolation, NetworkControl, PersistenceControl,
    ProcessControl,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use thiserror::Error;
use tracing::info;

/// Errors from a single remediation dispatch.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("missing or malformed parameter '{0}'")]
    BadParameter(&'static str),

    #[error("dispatch failed: {0}")]
    Failed(String),
}

impl From<crate::platform::PlatformError> for RemediationError {
    fn from(err: crate::platform::PlatformError) -> Self {
        RemediationError::Failed(err.to_string())
    }
}

/// One remediation capability, keyed by its command.
#[async_trait]
pub trait Remediation: Send + Sync {
    /// The command this implementation handles.
    fn command(&self) -> ActionCommand;

    /// Short description for the console.
    fn description(&self) -> &str;

    /// Performs the remediation. Returns a human-readable detail line on
    /// success; the executor records it in the case's execution log.
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError>;
}

/// Explicit command-to-implementation registry, built at startup.
pub struct RemediationRegistry {
    remediations: HashMap<ActionCommand, Arc<dyn Remediation>>,
}

impl RemediationRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            remediations: HashMap::new(),
        }
    }

    /// Builds the standard registry covering the full vocabulary from the
    /// given platform primitives.
    pub fn standard(
        process: Arc<dyn ProcessControl>,
        quarantine: Arc<dyn FileQuarantine>,
        persistence: Arc<dyn PersistenceControl>,
        network: Arc<dyn NetworkControl>,
        isolation: Arc<dyn HostIsolation>,
        accounts: Arc<dyn AccountControl>,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::kill_process::KillProcessRemediation::new(
            process,
        )));
        registry.register(Arc::new(
            crate::quarantine_file::QuarantineFileRemediation::new(quarantine),
        ));
        registry.register(Arc::new(
            crate::remove_persistence::RemovePersistenceRemediation::new(persistence),
        ));
        registry.register(Arc::new(
            crate::block_network::BlockNetworkRemediation::new(network),
        ));
        registry.register(Arc::new(crate::isolate_host::IsolateHostRemediation::new(
            isolation,
        )));
        registry.register(Arc::new(
            crate::disable_account::DisableAccountRemediation::new(Arc::clone(&accounts)),
        ));
        registry.register(Arc::new(
            crate::reset_password::ResetPasswordRemediation::new(accounts),
        ));
        registry
    }

    /// Registers one implementation, replacing any previous one for the
    /// same command.
    pub fn register(&mut self, remediation: Arc<dyn Remediation>) {
        info!(command = %remediation.command(), "Registering remediation");
        self.remediations
            .insert(remediation.command(), remediation);
    }

    /// Looks up the implementation for a command.
    pub fn get(&self, command: ActionCommand) -> Option<Arc<dyn Remediation>> {
        self.remediations.get(&command).cloned()
    }

    /// Commands with a registered implementation.
    pub fn registered_commands(&self) -> Vec<ActionCommand> {
        self.remediations.keys().copied().collect()
    }
}

impl Default for RemediationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{SimulatedPlatform, SysinfoProcessControl};

    #[test]
    fn test_standard_registry_covers_full_vocabulary() {
        let sim = Arc::new(SimulatedPlatform);
        let registry = RemediationRegistry::standard(
            Arc::new(SysinfoProcessControl),
            Arc::clone(&sim) as Arc<dyn FileQuarantine>,
            Arc::clone(&sim) as Arc<dyn PersistenceControl>,
            Arc::clone(&sim) as Arc<dyn NetworkControl>,
            Arc::clone(&sim) as Arc<dyn HostIsolation>,
            sim as Arc<dyn AccountControl>,
        );

        for command in ActionCommand::ALL {
            assert!(
                registry.get(command).is_some(),
                "no remediation registered for {}",
                command
            );
        }
    }

    #[test]
    fn test_empty_registry_reports_nothing() {
        let registry = RemediationRegistry::new();
        assert!(registry.get(ActionCommand::KillProcess).is_none());
        assert!(registry.registered_commands().is_empty());
    }
}
