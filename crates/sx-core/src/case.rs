//! Case lifecycle data model.
//!
//! A [`Case`] is the full record for one threat event, from detection
//! through execution or denial. Exactly one case exists per event; cases
//! never merge or split, and the case owns its report, plan, verdict, and
//! execution log as value data.
//!
//! ## State machine
//!
//! ```text
//! detected -> analyzing -> awaiting_approval -> approved -> executed
//!                      \-> failed            \-> denied  \-> failed
//! ```
//!
//! `executed`, `denied`, and `failed` are terminal. A decision against a
//! case that is not awaiting approval is rejected and leaves the case
//! unchanged.

use crate::event::AlertRecord;
use crate::plan::{ActionCommand, AnalystReport, CandidatePlan, GateVerdict};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Status of a case in the approval workflow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Event queued, analysis not yet started.
    Detected,
    /// The analysis pipeline is working on this case.
    Analyzing,
    /// Gate passed; waiting for a human decision.
    AwaitingApproval,
    /// Human approved; execution not yet complete.
    Approved,
    /// Human denied. Terminal.
    Denied,
    /// All actions attempted and the plan dispatched. Terminal.
    Executed,
    /// Analysis, gating, or execution failed. Terminal.
    Failed,
}

impl CaseStatus {
    /// Whether no further transitions are permitted out of this status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CaseStatus::Executed | CaseStatus::Denied | CaseStatus::Failed
        )
    }

    /// The set of statuses this one may transition to.
    fn successors(&self) -> &'static [CaseStatus] {
        match self {
            CaseStatus::Detected => &[CaseStatus::Analyzing],
            CaseStatus::Analyzing => &[CaseStatus::AwaitingApproval, CaseStatus::Failed],
            CaseStatus::AwaitingApproval => &[CaseStatus::Approved, CaseStatus::Denied],
            CaseStatus::Approved => &[CaseStatus::Executed, CaseStatus::Failed],
            CaseStatus::Executed | CaseStatus::Denied | CaseStatus::Failed => &[],
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseStatus::Detected => write!(f, "detected"),
            CaseStatus::Analyzing => write!(f, "analyzing"),
            CaseStatus::AwaitingApproval => write!(f, "awaiting_approval"),
            CaseStatus::Approved => write!(f, "approved"),
            CaseStatus::Denied => write!(f, "denied"),
            CaseStatus::Executed => write!(f, "executed"),
            CaseStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Attempted transition that the state machine does not permit.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid case transition from {from} to {to}")]
pub struct TransitionError {
    pub from: CaseStatus,
    pub to: CaseStatus,
}

/// One recorded status change, kept as the case's audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: CaseStatus,
    pub to: CaseStatus,
    pub at: DateTime<Utc>,
    /// Actor or reason, e.g. "pipeline", "operator", or a failure message.
    pub note: Option<String>,
}

/// Outcome of dispatching one action to a remediation primitive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success,
    Failed,
    /// No primitive registered for the action's command.
    Skipped,
}

impl std::fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchOutcome::Success => write!(f, "SUCCESS"),
            DispatchOutcome::Failed => write!(f, "FAILED"),
            DispatchOutcome::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// One entry of a case's execution log, in attempt order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEntry {
    /// Action id from the plan.
    pub action_id: String,
    /// Command that was dispatched.
    pub command: ActionCommand,
    /// How the dispatch ended.
    pub outcome: DispatchOutcome,
    /// Primitive-supplied detail message.
    pub detail: String,
    /// When the dispatch was attempted.
    pub attempted_at: DateTime<Utc>,
}

/// The full lifecycle record for one threat event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Case {
    /// Unique case identifier.
    pub id: Uuid,
    /// The alert (event + host context) this case was opened for.
    pub alert: AlertRecord,
    /// Current workflow status.
    pub status: CaseStatus,
    /// Analyst stage output, once available.
    pub report: Option<AnalystReport>,
    /// Expert stage output, once available.
    pub plan: Option<CandidatePlan>,
    /// Gate result, once evaluated.
    pub verdict: Option<GateVerdict>,
    /// Per-action outcomes from execution, in attempt order.
    pub execution_log: Vec<ExecutionEntry>,
    /// Why the case failed, when status is `failed`.
    pub failure_reason: Option<String>,
    /// Every status change the case has gone through.
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Opens a new case in the `detected` state.
    pub fn open(alert: AlertRecord) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            alert,
            status: CaseStatus::Detected,
            report: None,
            plan: None,
            verdict: None,
            execution_log: Vec::new(),
            failure_reason: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Moves the case to a new status, enforcing the transition table.
    ///
    /// On rejection the case is left unchanged.
    pub fn transition(
        &mut self,
        to: CaseStatus,
        note: Option<String>,
    ) -> Result<(), TransitionError> {
        if !self.status.successors().contains(&to) {
            return Err(TransitionError {
                from: self.status,
                to,
            });
        }
        let from = self.status;
        self.status = to;
        self.updated_at = Utc::now();
        self.history.push(StatusChange {
            from,
            to,
            at: self.updated_at,
            note,
        });
        Ok(())
    }

    /// Marks the case failed with a reason. Valid from `analyzing` and
    /// `approved` only; other states reject as usual.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        let reason = reason.into();
        self.transition(CaseStatus::Failed, Some(reason.clone()))?;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Records one action dispatch outcome.
    pub fn record_execution(&mut self, entry: ExecutionEntry) {
        self.execution_log.push(entry);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ThreatEvent, ThreatKind};

    fn test_case() -> Case {
        let event = ThreatEvent::new(
            101,
            "powershell.exe",
            "powershell.exe -NoP IEX ...",
            "ps-cradle",
            ThreatKind::FilelessAttack,
        );
        Case::open(AlertRecord::new("host-a", event))
    }

    fn advance(case: &mut Case, to: CaseStatus) {
        case.transition(to, None).unwrap();
    }

    #[test]
    fn test_happy_path_to_executed() {
        let mut case = test_case();
        advance(&mut case, CaseStatus::Analyzing);
        advance(&mut case, CaseStatus::AwaitingApproval);
        advance(&mut case, CaseStatus::Approved);
        advance(&mut case, CaseStatus::Executed);
        assert!(case.status.is_terminal());
        assert_eq!(case.history.len(), 4);
    }

    #[test]
    fn test_analysis_failure_path() {
        let mut case = test_case();
        advance(&mut case, CaseStatus::Analyzing);
        case.fail("all backends exhausted").unwrap();
        assert_eq!(case.status, CaseStatus::Failed);
        assert_eq!(
            case.failure_reason.as_deref(),
            Some("all backends exhausted")
        );
    }

    #[test]
    fn test_deny_then_approve_rejected() {
        let mut case = test_case();
        advance(&mut case, CaseStatus::Analyzing);
        advance(&mut case, CaseStatus::AwaitingApproval);
        advance(&mut case, CaseStatus::Denied);

        let err = case
            .transition(CaseStatus::Approved, None)
            .unwrap_err();
        assert_eq!(err.from, CaseStatus::Denied);
        assert_eq!(case.status, CaseStatus::Denied);
    }

    #[test]
    fn test_double_approve_rejected() {
        let mut case = test_case();
        advance(&mut case, CaseStatus::Analyzing);
        advance(&mut case, CaseStatus::AwaitingApproval);
        advance(&mut case, CaseStatus::Approved);

        assert!(case.transition(CaseStatus::Approved, None).is_err());
        assert_eq!(case.status, CaseStatus::Approved);
    }

    #[test]
    fn test_no_exit_from_terminal_states() {
        for terminal in [CaseStatus::Executed, CaseStatus::Denied, CaseStatus::Failed] {
            assert!(terminal.is_terminal());
            assert!(terminal.successors().is_empty());
        }
    }

    #[test]
    fn test_cannot_skip_analysis() {
        let mut case = test_case();
        assert!(case
            .transition(CaseStatus::AwaitingApproval, None)
            .is_err());
        assert!(case.transition(CaseStatus::Approved, None).is_err());
        assert_eq!(case.status, CaseStatus::Detected);
        assert!(case.history.is_empty());
    }
}
