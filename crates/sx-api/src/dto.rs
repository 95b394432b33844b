//! Request and response bodies for the API surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sx_core::{
    AnalystReport, CandidatePlan, Case, CaseStatus, ExecutionEntry, GateVerdict, SignedPlan,
    StatusChange, ThreatEvent,
};
use sx_sentry::ProcessRecord;
use uuid::Uuid;

/// Push-based telemetry submitted by a remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    /// Hostname of the submitting agent.
    pub hostname: String,
    /// OS platform string, informational.
    #[serde(default)]
    pub os_platform: Option<String>,
    /// Live process table as seen by the agent.
    pub processes: Vec<ProcessRecord>,
    /// Open network connections. Accepted for operator visibility;
    /// signature matching runs over the process list.
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// One network connection reported by an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Owning process id, when the agent could resolve it.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Remote endpoint address.
    #[serde(default)]
    pub remote_address: Option<String>,
    /// Remote endpoint port.
    #[serde(default)]
    pub remote_port: Option<u16>,
}

/// Result of a telemetry submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    /// Hostname the telemetry was attributed to.
    pub hostname: String,
    /// Number of new threat events queued from this submission.
    pub events_queued: usize,
    /// Queue depth after the submission.
    pub queue_depth: usize,
}

/// Current state of the threat queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    /// Events currently waiting for the pipeline.
    pub depth: usize,
    /// Events evicted due to overflow since startup.
    pub dropped: u64,
}

/// Full view of one case, for the console's detail pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDetailResponse {
    pub id: Uuid,
    pub hostname: String,
    pub status: CaseStatus,
    /// The detection that opened the case.
    pub event: ThreatEvent,
    pub report: Option<AnalystReport>,
    pub plan: Option<CandidatePlan>,
    pub verdict: Option<GateVerdict>,
    pub execution_log: Vec<ExecutionEntry>,
    pub failure_reason: Option<String>,
    pub history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Case> for CaseDetailResponse {
    fn from(case: Case) -> Self {
        Self {
            id: case.id,
            hostname: case.alert.hostname,
            status: case.status,
            event: case.alert.event,
            report: case.report,
            plan: case.plan,
            verdict: case.verdict,
            execution_log: case.execution_log,
            failure_reason: case.failure_reason,
            history: case.history,
            created_at: case.created_at,
            updated_at: case.updated_at,
        }
    }
}

/// A human approve/deny decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// True to approve and execute, false to deny.
    pub approve: bool,
    /// Who made the decision; defaults to "operator".
    #[serde(default)]
    pub actor: Option<String>,
}

/// Outcome of a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub case_id: Uuid,
    /// Case status after the decision (and execution, on approval).
    pub status: CaseStatus,
    /// The signed artifact, present only on approval. Suitable for
    /// transmission to a remote enforcement agent.
    pub signed_plan: Option<SignedPlan>,
    /// Per-action outcomes in attempt order, empty on denial.
    pub execution_log: Vec<ExecutionEntry>,
}

/// Liveness probe response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Current threat queue depth.
    pub queue_depth: usize,
    /// Total cases held in the store.
    pub case_count: usize,
}
