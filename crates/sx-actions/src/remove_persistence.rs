//! Persistence removal remediation.

use crate::platform::PersistenceControl;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::instrument;

/// Removes the persistence entry named by the action's `location`
/// parameter (a registry key, service name, or startup path).
pub struct RemovePersistenceRemediation {
    persistence: Arc<dyn PersistenceControl>,
}

impl RemovePersistenceRemediation {
    pub fn new(persistence: Arc<dyn PersistenceControl>) -> Self {
        Self { persistence }
    }
}

#[async_trait]
impl Remediation for RemovePersistenceRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::RemovePersistence
    }

    fn description(&self) -> &str {
        "Removes an autorun or service persistence entry"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let location = action
            .param_str("location")
            .filter(|l| !l.trim().is_empty())
            .ok_or(RemediationError::BadParameter("location"))?;

        self.persistence.remove(location).await?;
        Ok(format!("Removed persistence entry {}", location))
    }
}
