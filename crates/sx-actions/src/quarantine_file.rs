//! File quarantine remediation.

use crate::platform::FileQuarantine;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::instrument;

/// Quarantines the file named by the action's `path` parameter.
pub struct QuarantineFileRemediation {
    quarantine: Arc<dyn FileQuarantine>,
}

impl QuarantineFileRemediation {
    pub fn new(quarantine: Arc<dyn FileQuarantine>) -> Self {
        Self { quarantine }
    }
}

#[async_trait]
impl Remediation for QuarantineFileRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::QuarantineFile
    }

    fn description(&self) -> &str {
        "Moves a staged file into quarantine"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let path = action
            .param_str("path")
            .filter(|p| !p.trim().is_empty())
            .ok_or(RemediationError::BadParameter("path"))?;

        self.quarantine.quarantine(path).await?;
        Ok(format!("Quarantined file {}", path))
    }
}
