//! Threat event data model.
//!
//! A [`ThreatEvent`] is a single detected indicator of compromise tied to
//! one OS process. Events are immutable once constructed; identity is the
//! process id for the lifetime of the monitoring session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Categories of host threat the detector can classify.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    /// In-memory execution, e.g. a PowerShell download cradle.
    FilelessAttack,
    /// Autorun or service persistence being installed.
    RegistryPersistence,
    /// Payload being written to disk for later execution.
    FileStaging,
    /// Outbound command-and-control connection attempt.
    NetworkC2,
    /// Matched a signature with no assigned category.
    Unknown,
}

impl std::fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreatKind::FilelessAttack => write!(f, "fileless_attack"),
            ThreatKind::RegistryPersistence => write!(f, "registry_persistence"),
            ThreatKind::FileStaging => write!(f, "file_staging"),
            ThreatKind::NetworkC2 => write!(f, "network_c2"),
            ThreatKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A single detection: one process matched one signature.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreatEvent {
    /// OS process id of the offending process.
    pub process_id: u32,
    /// Executable name as reported by the process table.
    pub process_name: String,
    /// Full command line that triggered the match.
    pub command_line: String,
    /// Identifier of the signature that matched.
    pub signature_id: String,
    /// Threat category fixed by the matching signature.
    pub kind: ThreatKind,
    /// When the detector observed the match.
    pub detected_at: DateTime<Utc>,
}

impl ThreatEvent {
    /// Creates an event stamped with the current time.
    pub fn new(
        process_id: u32,
        process_name: impl Into<String>,
        command_line: impl Into<String>,
        signature_id: impl Into<String>,
        kind: ThreatKind,
    ) -> Self {
        Self {
            process_id,
            process_name: process_name.into(),
            command_line: command_line.into(),
            signature_id: signature_id.into(),
            kind,
            detected_at: Utc::now(),
        }
    }
}

/// Normalized view of a [`ThreatEvent`] plus host context.
///
/// This is the unit handed into the analysis pipeline. Exactly one record
/// is created per event, when the pipeline takes ownership of it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Hostname of the machine the event was observed on.
    pub hostname: String,
    /// The underlying detection.
    pub event: ThreatEvent,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Wraps an event with host context.
    pub fn new(hostname: impl Into<String>, event: ThreatEvent) -> Self {
        Self {
            hostname: hostname.into(),
            event,
            created_at: Utc::now(),
        }
    }

    /// Short human-readable title for logs and the console.
    pub fn title(&self) -> String {
        format!(
            "{} detected on '{}' (pid {})",
            self.event.kind, self.hostname, self.event.process_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threat_kind_serialization() {
        let json = serde_json::to_string(&ThreatKind::FilelessAttack).unwrap();
        assert_eq!(json, "\"fileless_attack\"");

        let kind: ThreatKind = serde_json::from_str("\"network_c2\"").unwrap();
        assert_eq!(kind, ThreatKind::NetworkC2);
    }

    #[test]
    fn test_alert_record_title() {
        let event = ThreatEvent::new(
            4242,
            "powershell.exe",
            "powershell.exe -NoP ...",
            "ps-cradle",
            ThreatKind::FilelessAttack,
        );
        let alert = AlertRecord::new("workstation-07", event);
        assert!(alert.title().contains("fileless_attack"));
        assert!(alert.title().contains("workstation-07"));
        assert!(alert.title().contains("4242"));
    }
}
