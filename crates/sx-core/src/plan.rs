//! Analysis report and remediation plan data model.
//!
//! The [`AnalystReport`] is advisory prose for a human operator; the
//! [`CandidatePlan`] is the machine-executable artifact. Only a plan that
//! has passed both gate checks and been signed ever reaches a remediation
//! primitive.

use crate::event::ThreatKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Severity assigned to a candidate plan.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl ThreatKind {
    /// Default severity used when a backend does not supply one.
    pub fn default_severity(&self) -> Severity {
        match self {
            ThreatKind::FilelessAttack | ThreatKind::NetworkC2 => Severity::Critical,
            ThreatKind::RegistryPersistence => Severity::High,
            ThreatKind::FileStaging => Severity::Medium,
            ThreatKind::Unknown => Severity::Medium,
        }
    }
}

/// The closed vocabulary of remediation commands.
///
/// Plans are never freeformly interpreted; every action must name one of
/// these commands and carry the parameters documented per variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ActionCommand {
    /// Terminate a process. Params: `pid` (integer).
    KillProcess,
    /// Move a file into quarantine. Params: `path` (string).
    QuarantineFile,
    /// Remove an autorun/service persistence entry. Params: `location` (string).
    RemovePersistence,
    /// Block a remote address. Params: `address` (string).
    BlockNetwork,
    /// Isolate a host from the network. Params: `hostname` (string).
    IsolateHost,
    /// Disable a user account. Params: `username` (string).
    DisableAccount,
    /// Force a credential reset. Params: `username` (string).
    ResetPassword,
}

impl ActionCommand {
    /// All commands, in documentation order.
    pub const ALL: [ActionCommand; 7] = [
        ActionCommand::KillProcess,
        ActionCommand::QuarantineFile,
        ActionCommand::RemovePersistence,
        ActionCommand::BlockNetwork,
        ActionCommand::IsolateHost,
        ActionCommand::DisableAccount,
        ActionCommand::ResetPassword,
    ];

    /// Wire name of the command.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionCommand::KillProcess => "kill_process",
            ActionCommand::QuarantineFile => "quarantine_file",
            ActionCommand::RemovePersistence => "remove_persistence",
            ActionCommand::BlockNetwork => "block_network",
            ActionCommand::IsolateHost => "isolate_host",
            ActionCommand::DisableAccount => "disable_account",
            ActionCommand::ResetPassword => "reset_password",
        }
    }

    /// Name of the parameter this command requires.
    pub fn required_param(&self) -> &'static str {
        match self {
            ActionCommand::KillProcess => "pid",
            ActionCommand::QuarantineFile => "path",
            ActionCommand::RemovePersistence => "location",
            ActionCommand::BlockNetwork => "address",
            ActionCommand::IsolateHost => "hostname",
            ActionCommand::DisableAccount | ActionCommand::ResetPassword => "username",
        }
    }
}

impl std::fmt::Display for ActionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of a remediation plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Action {
    /// Plan-unique identifier for this action.
    pub id: String,
    /// Which remediation primitive to invoke.
    pub command: ActionCommand,
    /// Command-dependent parameters.
    pub params: HashMap<String, serde_json::Value>,
    /// Execution order key; lower runs first. Valid range 0..=100.
    pub priority: i64,
}

impl Action {
    /// Convenience accessor for a string parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }

    /// Convenience accessor for an unsigned integer parameter.
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(|v| v.as_u64())
    }
}

/// Human-readable analysis produced by the Analyst stage.
///
/// Advisory only; nothing in the report is ever executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalystReport {
    /// One or two sentence summary of the threat.
    pub summary: String,
    /// ATT&CK-style technique identifier, or "unknown".
    pub technique_id: String,
    /// Ordered manual remediation steps for a human operator.
    pub remediation_steps: Vec<String>,
}

impl AnalystReport {
    /// Canonical payload substituted when a backend response cannot be
    /// parsed as a structured report.
    pub fn fallback(backend: &str) -> Self {
        Self {
            summary: format!("Alert processed under fallback by backend '{}'", backend),
            technique_id: "unknown".to_string(),
            remediation_steps: vec![
                "Review the raw alert and backend response manually".to_string()
            ],
        }
    }
}

/// Machine-executable remediation plan produced by the Expert stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidatePlan {
    /// Unique plan identifier.
    pub plan_id: String,
    /// The case this plan belongs to. Must match the owning case.
    pub case_id: String,
    /// Which backend produced the plan.
    pub generated_by: String,
    /// Threat classification the plan responds to.
    pub threat_type: ThreatKind,
    /// Severity assessment.
    pub severity: Severity,
    /// Backend confidence in the plan, in [0, 1].
    pub confidence: f64,
    /// Remediation steps. Order encodes intent; execution order is
    /// ascending `priority`.
    pub actions: Vec<Action>,
}

impl CandidatePlan {
    /// Returns the actions sorted by ascending priority, the order the
    /// executor will attempt them in. Sort is stable, so plan order breaks
    /// priority ties.
    pub fn actions_in_execution_order(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.priority);
        actions
    }
}

/// Combined result of the structural and policy checks.
///
/// A plan is executable iff both flags are true. That conjunction is
/// enforced again at the executor boundary; the verdict is never advisory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GateVerdict {
    /// Whether the plan conforms to the structural schema.
    pub schema_valid: bool,
    /// Whether the plan passed policy evaluation.
    pub policy_compliant: bool,
    /// Human-readable policy result, pass or fail.
    pub policy_message: String,
    /// Structural violations, retained for operator visibility.
    pub schema_violations: Vec<String>,
}

impl GateVerdict {
    /// True iff the plan may be signed and executed.
    pub fn executable(&self) -> bool {
        self.schema_valid && self.policy_compliant
    }
}
