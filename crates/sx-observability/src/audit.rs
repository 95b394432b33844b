//! Bounded in-memory audit trail.
//!
//! Records the decisions that matter for after-the-fact review: case
//! lifecycle changes, gate verdicts, human decisions, and per-action
//! dispatch outcomes. Entries are also mirrored to the tracing log; the
//! ring buffer exists so the read surface can serve recent history
//! without a log backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Default number of retained entries.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// One auditable occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    CaseOpened {
        case_id: Uuid,
        title: String,
    },
    StatusChanged {
        case_id: Uuid,
        from: String,
        to: String,
    },
    GateEvaluated {
        case_id: Uuid,
        schema_valid: bool,
        policy_compliant: bool,
        policy_message: String,
    },
    DecisionRecorded {
        case_id: Uuid,
        approved: bool,
        actor: String,
    },
    ActionDispatched {
        case_id: Uuid,
        action_id: String,
        command: String,
        outcome: String,
        detail: String,
    },
}

/// A timestamped audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Ring buffer of recent audit entries.
pub struct AuditTrail {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditTrail {
    /// Creates a trail with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// Creates a trail retaining at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Appends an event, evicting the oldest entry when full.
    pub fn record(&self, event: AuditEvent) {
        info!(event = ?event, "audit");
        let mut entries = self.entries.lock().expect("audit lock poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(AuditEntry {
            at: Utc::now(),
            event,
        });
    }

    /// Snapshot of retained entries, oldest first.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .expect("audit lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("audit lock poisoned").len()
    }

    /// Whether the trail is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AuditTrail {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_read_back() {
        let trail = AuditTrail::new();
        let case_id = Uuid::new_v4();
        trail.record(AuditEvent::CaseOpened {
            case_id,
            title: "test case".to_string(),
        });
        trail.record(AuditEvent::DecisionRecorded {
            case_id,
            approved: true,
            actor: "operator".to_string(),
        });

        let entries = trail.entries();
        assert_eq!(entries.len(), 2);
        assert!(matches!(entries[0].event, AuditEvent::CaseOpened { .. }));
        assert!(matches!(
            entries[1].event,
            AuditEvent::DecisionRecorded { approved: true, .. }
        ));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let trail = AuditTrail::with_capacity(2);
        for i in 0..5 {
            trail.record(AuditEvent::CaseOpened {
                case_id: Uuid::new_v4(),
                title: format!("case {}", i),
            });
        }
        let entries = trail.entries();
        assert_eq!(entries.len(), 2);
        match &entries[0].event {
            AuditEvent::CaseOpened { title, .. } => assert_eq!(title, "case 3"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_serializes_with_tag() {
        let trail = AuditTrail::new();
        trail.record(AuditEvent::ActionDispatched {
            case_id: Uuid::new_v4(),
            action_id: "a1".to_string(),
            command: "kill_process".to_string(),
            outcome: "SUCCESS".to_string(),
            detail: "Terminated process with pid 5".to_string(),
        });
        let json = serde_json::to_string(&trail.entries()[0]).unwrap();
        assert!(json.contains("\"type\":\"action_dispatched\""));
        assert!(json.contains("kill_process"));
    }
}
