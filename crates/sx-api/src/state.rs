//! Shared application state handed to every handler.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use sx_actions::PlanExecutor;
use sx_core::{CaseStore, ThreatQueue};
use sx_observability::AuditTrail;
use sx_sentry::SignatureTable;

/// Handles to the owned stores and services. Everything is behind an
/// `Arc`; cloning the state is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The case store shared with the pipeline.
    pub store: Arc<CaseStore>,
    /// The threat queue shared with the detector and pipeline.
    pub queue: Arc<ThreatQueue>,
    /// Signature table reapplied to push-based telemetry.
    pub signatures: Arc<SignatureTable>,
    /// Process ids already turned into events via ingest.
    pub ingest_seen: Arc<Mutex<HashSet<u32>>>,
    /// Executor invoked on approval.
    pub executor: Arc<PlanExecutor>,
    /// Audit trail for decisions.
    pub audit: Arc<AuditTrail>,
}

impl AppState {
    /// Bundles the shared handles into an API state.
    pub fn new(
        store: Arc<CaseStore>,
        queue: Arc<ThreatQueue>,
        signatures: Arc<SignatureTable>,
        executor: Arc<PlanExecutor>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            store,
            queue,
            signatures,
            ingest_seen: Arc::new(Mutex::new(HashSet::new())),
            executor,
            audit,
        }
    }
}
