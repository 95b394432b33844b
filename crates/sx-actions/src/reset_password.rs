//! Credential reset remediation.

use crate::platform::AccountControl;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::instrument;

/// Forces a password reset for the account named by the action's
/// `username` parameter.
pub struct ResetPasswordRemediation {
    accounts: Arc<dyn AccountControl>,
}

impl ResetPasswordRemediation {
    pub fn new(accounts: Arc<dyn AccountControl>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl Remediation for ResetPasswordRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::ResetPassword
    }

    fn description(&self) -> &str {
        "Forces a credential reset for a user account"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let username = action
            .param_str("username")
            .filter(|u| !u.trim().is_empty())
            .ok_or(RemediationError::BadParameter("username"))?;

        self.accounts.reset_password(username).await?;
        Ok(format!("Forced password reset for {}", username))
    }
}
