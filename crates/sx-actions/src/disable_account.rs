//! Account disabling remediation.

use crate::platform::AccountControl;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::instrument;

/// Disables the account named by the action's `username` parameter.
pub struct DisableAccountRemediation {
    accounts: Arc<dyn AccountControl>,
}

impl DisableAccountRemediation {
    pub fn new(accounts: Arc<dyn AccountControl>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl Remediation for DisableAccountRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::DisableAccount
    }

    fn description(&self) -> &str {
        "Disables a compromised user account"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let username = action
            .param_str("username")
            .filter(|u| !u.trim().is_empty())
            .ok_or(RemediationError::BadParameter("username"))?;

        self.accounts.disable(username).await?;
        Ok(format!("Disabled account {}", username))
    }
}
