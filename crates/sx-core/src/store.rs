//! Owned case store shared between the pipeline and the decision surface.
//!
//! The store is the single home of all cases; components receive a handle
//! (`Arc<CaseStore>`) at startup rather than reaching for globals. The
//! inner lock is held only for the duration of one read/modify/write,
//! never across a backend call or I/O wait.

use crate::case::{Case, CaseStatus, TransitionError};
use crate::event::ThreatKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Errors from case store operations.
#[derive(Debug, Error)]
pub enum CaseStoreError {
    #[error("case not found: {0}")]
    NotFound(Uuid),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

/// Compact listing row for the console's case table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseSummary {
    pub id: Uuid,
    pub hostname: String,
    pub process_id: u32,
    pub kind: ThreatKind,
    pub status: CaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Case> for CaseSummary {
    fn from(case: &Case) -> Self {
        Self {
            id: case.id,
            hostname: case.alert.hostname.clone(),
            process_id: case.alert.event.process_id,
            kind: case.alert.event.kind,
            status: case.status,
            created_at: case.created_at,
            updated_at: case.updated_at,
        }
    }
}

/// In-memory store of all cases, keyed by case id.
pub struct CaseStore {
    cases: RwLock<HashMap<Uuid, Case>>,
}

impl CaseStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            cases: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts a freshly opened case and returns its id.
    pub async fn insert(&self, case: Case) -> Uuid {
        let id = case.id;
        info!(case_id = %id, title = %case.alert.title(), "Case opened");
        self.cases.write().await.insert(id, case);
        id
    }

    /// Returns a clone of the case, if present.
    pub async fn get(&self, id: Uuid) -> Option<Case> {
        self.cases.read().await.get(&id).cloned()
    }

    /// Lists all cases as summaries, newest first.
    pub async fn list(&self) -> Vec<CaseSummary> {
        let cases = self.cases.read().await;
        let mut summaries: Vec<CaseSummary> = cases.values().map(CaseSummary::from).collect();
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    /// Number of cases currently held.
    pub async fn len(&self) -> usize {
        self.cases.read().await.len()
    }

    /// Whether the store holds no cases.
    pub async fn is_empty(&self) -> bool {
        self.cases.read().await.is_empty()
    }

    /// Counts cases per status.
    pub async fn counts_by_status(&self) -> HashMap<CaseStatus, usize> {
        let cases = self.cases.read().await;
        let mut counts = HashMap::new();
        for case in cases.values() {
            *counts.entry(case.status).or_insert(0) += 1;
        }
        counts
    }

    /// Applies a mutation to one case under the write lock.
    pub async fn update<F, R>(&self, id: Uuid, f: F) -> Result<R, CaseStoreError>
    where
        F: FnOnce(&mut Case) -> R,
    {
        let mut cases = self.cases.write().await;
        let case = cases.get_mut(&id).ok_or(CaseStoreError::NotFound(id))?;
        Ok(f(case))
    }

    /// Transitions a case, enforcing the state machine. The case is left
    /// unchanged when the transition is rejected.
    pub async fn transition(
        &self,
        id: Uuid,
        to: CaseStatus,
        note: Option<String>,
    ) -> Result<Case, CaseStoreError> {
        let mut cases = self.cases.write().await;
        let case = cases.get_mut(&id).ok_or(CaseStoreError::NotFound(id))?;
        case.transition(to, note)?;
        info!(case_id = %id, status = %case.status, "Case transitioned");
        Ok(case.clone())
    }

    /// Applies a human approve/deny decision.
    ///
    /// Valid only while the case is awaiting approval; any other state is
    /// rejected with `InvalidTransition` and the case is not modified.
    pub async fn decide(
        &self,
        id: Uuid,
        approve: bool,
        actor: &str,
    ) -> Result<Case, CaseStoreError> {
        let to = if approve {
            CaseStatus::Approved
        } else {
            CaseStatus::Denied
        };
        let mut cases = self.cases.write().await;
        let case = cases.get_mut(&id).ok_or(CaseStoreError::NotFound(id))?;
        if case.status != CaseStatus::AwaitingApproval {
            return Err(TransitionError {
                from: case.status,
                to,
            }
            .into());
        }
        case.transition(to, Some(format!("decision by {}", actor)))?;
        info!(case_id = %id, approve, actor, "Decision recorded");
        Ok(case.clone())
    }
}

impl Default for CaseStore {
    fn default() -> Self {
        Self::new()
    }
}
