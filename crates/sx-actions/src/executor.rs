//! The plan executor.
//!
//! On approval the executor canonicalizes and signs the plan, then walks
//! the actions in ascending priority, dispatching each to its registered
//! remediation exactly once. Every dispatch outcome is appended to the
//! case's execution log in attempt order; a failing action never aborts
//! the remainder. An unsigned plan, a non-approved case, or a verdict
//! that is not fully passing never reaches a primitive.

use crate::registry::RemediationRegistry;
use chrono::Utc;
use std::sync::Arc;
use sx_core::{
    CaseStatus, CaseStore, CaseStoreError, DispatchOutcome, ExecutionEntry, PlanSigner,
    SignedPlan, SigningError,
};
use sx_observability::{AuditEvent, AuditTrail};
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Errors from an execution attempt.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Store(#[from] CaseStoreError),

    #[error(transparent)]
    Transition(#[from] sx_core::TransitionError),

    #[error("case {case_id} is {status}, not approved")]
    NotApproved { case_id: Uuid, status: CaseStatus },

    #[error("case {0} has no candidate plan")]
    MissingPlan(Uuid),

    #[error("case {0} has no gate verdict")]
    MissingVerdict(Uuid),

    #[error("case {0} is not executable: {1}")]
    NotExecutable(Uuid, String),

    /// Signing failed; the case remains approved so the attempt can be
    /// retried.
    #[error("signing failed for case {0}: {1}")]
    Signing(Uuid, #[source] SigningError),
}

/// Signs approved plans and dispatches their actions.
pub struct PlanExecutor {
    store: Arc<CaseStore>,
    registry: Arc<RemediationRegistry>,
    signer: Arc<PlanSigner>,
    audit: Option<Arc<AuditTrail>>,
}

impl PlanExecutor {
    /// Creates an executor over the shared store, registry, and signer.
    pub fn new(
        store: Arc<CaseStore>,
        registry: Arc<RemediationRegistry>,
        signer: Arc<PlanSigner>,
    ) -> Self {
        Self {
            store,
            registry,
            signer,
            audit: None,
        }
    }

    /// Attaches an audit trail for per-action outcome records.
    pub fn with_audit(mut self, audit: Arc<AuditTrail>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Executes the approved case's plan.
    ///
    /// Preconditions enforced here, independent of what upstream already
    /// checked: the case is `approved`, it carries a plan, and its gate
    /// verdict passes both checks. Each action is attempted exactly once,
    /// with no automatic retry.
    #[instrument(skip(self), fields(case_id = %case_id))]
    pub async fn execute_case(&self, case_id: Uuid) -> Result<SignedPlan, ExecutorError> {
        let case = self
            .store
            .get(case_id)
            .await
            .ok_or(CaseStoreError::NotFound(case_id))?;

        if case.status != CaseStatus::Approved {
            return Err(ExecutorError::NotApproved {
                case_id,
                status: case.status,
            });
        }
        let plan = case.plan.ok_or(ExecutorError::MissingPlan(case_id))?;
        let verdict = case.verdict.ok_or(ExecutorError::MissingVerdict(case_id))?;
        if !verdict.executable() {
            // Belt and braces: approval should be unreachable for a
            // failing verdict, but no action dispatches either way.
            return Err(ExecutorError::NotExecutable(
                case_id,
                verdict.policy_message,
            ));
        }

        // Sign first; nothing unsigned is ever dispatched. On failure the
        // case stays approved for a retry.
        let signed = self
            .signer
            .sign(&plan)
            .map_err(|e| ExecutorError::Signing(case_id, e))?;
        info!(plan_id = %plan.plan_id, "Plan signed, dispatching actions");

        let mut successes = 0usize;
        let mut failures = 0usize;

        for action in signed.plan.actions_in_execution_order() {
            let (outcome, detail) = match self.registry.get(action.command) {
                None => (
                    DispatchOutcome::Skipped,
                    format!("no remediation registered for {}", action.command),
                ),
                Some(remediation) => match remediation.dispatch(action).await {
                    Ok(detail) => (DispatchOutcome::Success, detail),
                    Err(err) => (DispatchOutcome::Failed, err.to_string()),
                },
            };

            match outcome {
                DispatchOutcome::Success => successes += 1,
                DispatchOutcome::Failed => failures += 1,
                DispatchOutcome::Skipped => {}
            }

            info!(
                action_id = %action.id,
                command = %action.command,
                outcome = %outcome,
                detail = %detail,
                "Action dispatched"
            );
            if let Some(audit) = &self.audit {
                audit.record(AuditEvent::ActionDispatched {
                    case_id,
                    action_id: action.id.clone(),
                    command: action.command.to_string(),
                    outcome: outcome.to_string(),
                    detail: detail.clone(),
                });
            }

            let entry = ExecutionEntry {
                action_id: action.id.clone(),
                command: action.command,
                outcome,
                detail,
                attempted_at: Utc::now(),
            };
            self.store
                .update(case_id, |case| case.record_execution(entry))
                .await?;
        }

        // Failed only when actions were dispatched and none succeeded;
        // partial success still counts as executed, with the log telling
        // the full story.
        if failures > 0 && successes == 0 {
            warn!(failures, "Every dispatched action failed");
            self.store
                .update(case_id, |case| {
                    case.fail(format!("all {} dispatched actions failed", failures))
                })
                .await??;
        } else {
            self.store
                .transition(
                    case_id,
                    CaseStatus::Executed,
                    Some(format!("{} succeeded, {} failed", successes, failures)),
                )
                .await?;
        }

        Ok(signed)
    }
}
