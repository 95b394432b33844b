//! Network blocking remediation.

use crate::platform::NetworkControl;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::instrument;

/// Blocks the remote address named by the action's `address` parameter.
pub struct BlockNetworkRemediation {
    network: Arc<dyn NetworkControl>,
}

impl BlockNetworkRemediation {
    pub fn new(network: Arc<dyn NetworkControl>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl Remediation for BlockNetworkRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::BlockNetwork
    }

    fn description(&self) -> &str {
        "Blocks an outbound address at the host firewall"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let address = action
            .param_str("address")
            .filter(|a| !a.trim().is_empty())
            .ok_or(RemediationError::BadParameter("address"))?;

        self.network.block(address).await?;
        Ok(format!("Blocked address {}", address))
    }
}
