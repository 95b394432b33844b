//! Host isolation remediation.

use crate::platform::HostIsolation;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::{info, instrument};

/// Isolates the host named by the action's `hostname` parameter.
pub struct IsolateHostRemediation {
    isolation: Arc<dyn HostIsolation>,
}

impl IsolateHostRemediation {
    pub fn new(isolation: Arc<dyn HostIsolation>) -> Self {
        Self { isolation }
    }
}

#[async_trait]
impl Remediation for IsolateHostRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::IsolateHost
    }

    fn description(&self) -> &str {
        "Isolates a host from the network"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let hostname = action
            .param_str("hostname")
            .filter(|h| !h.trim().is_empty())
            .ok_or(RemediationError::BadParameter("hostname"))?;

        self.isolation.isolate(hostname).await?;
        info!(hostname, "Host isolated");
        Ok(format!("Isolated host {}", hostname))
    }
}
