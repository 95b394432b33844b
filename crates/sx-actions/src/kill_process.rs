//! Process termination remediation.

use crate::platform::ProcessControl;
use crate::registry::{Remediation, RemediationError};
use async_trait::async_trait;
use std::sync::Arc;
use sx_core::{Action, ActionCommand};
use tracing::{info, instrument};

/// Terminates the process named by the action's `pid` parameter.
pub struct KillProcessRemediation {
    control: Arc<dyn ProcessControl>,
}

impl KillProcessRemediation {
    pub fn new(control: Arc<dyn ProcessControl>) -> Self {
        Self { control }
    }
}

#[async_trait]
impl Remediation for KillProcessRemediation {
    fn command(&self) -> ActionCommand {
        ActionCommand::KillProcess
    }

    fn description(&self) -> &str {
        "Terminates the offending process by pid"
    }

    #[instrument(skip(self, action), fields(action_id = %action.id))]
    async fn dispatch(&self, action: &Action) -> Result<String, RemediationError> {
        let pid = action
            .param_u64("pid")
            .and_then(|v| u32::try_from(v).ok())
            .ok_or(RemediationError::BadParameter("pid"))?;

        self.control.kill(pid).await?;
        info!(pid, "Process terminated");
        Ok(format!("Terminated process with pid {}", pid))
    }
}
