//! Ordered signature table for command-line matching.
//!
//! A signature is a `(name_substring, indicator_substring)` pair: the
//! process name must contain the first and the command line the second,
//! both case-insensitively. The table is ordered and the first match wins,
//! fixing the event's signature id and threat kind.

use crate::scanner::ProcessRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use sx_core::{ThreatEvent, ThreatKind};

/// One detection signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signature {
    /// Stable identifier recorded on emitted events.
    pub id: String,
    /// Substring the process name must contain.
    pub name_substring: String,
    /// Substring the command line must contain.
    pub indicator_substring: String,
    /// Threat category assigned on match.
    pub kind: ThreatKind,
}

/// Ordered collection of signatures with first-match-wins semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureTable {
    signatures: Vec<Signature>,
}

impl SignatureTable {
    /// Builds a table from an ordered signature list.
    pub fn new(signatures: Vec<Signature>) -> Self {
        Self { signatures }
    }

    /// The built-in table covering the demonstrated attack repertoire.
    pub fn default_table() -> Self {
        Self::new(vec![
            Signature {
                id: "ps-download-cradle".to_string(),
                name_substring: "powershell.exe".to_string(),
                indicator_substring: "nonexistent-malware.ps1".to_string(),
                kind: ThreatKind::FilelessAttack,
            },
            Signature {
                id: "cmd-file-staging".to_string(),
                name_substring: "cmd.exe".to_string(),
                indicator_substring: "staged_malware".to_string(),
                kind: ThreatKind::FileStaging,
            },
            Signature {
                id: "ps-c2-connect".to_string(),
                name_substring: "powershell.exe".to_string(),
                indicator_substring: ".connect".to_string(),
                kind: ThreatKind::NetworkC2,
            },
            Signature {
                id: "svchost-masquerade".to_string(),
                name_substring: "svchost.exe".to_string(),
                indicator_substring: "windows_update_service".to_string(),
                kind: ThreatKind::RegistryPersistence,
            },
        ])
    }

    /// Number of signatures in the table.
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Tests one process record against the table. Records with an empty
    /// command line never match.
    pub fn match_record(&self, record: &ProcessRecord) -> Option<&Signature> {
        if record.command_line.trim().is_empty() {
            return None;
        }
        let name = record.name.to_lowercase();
        let cmdline = record.command_line.to_lowercase();
        self.signatures
            .iter()
            .find(|s| {
                name.contains(&s.name_substring.to_lowercase())
                    && cmdline.contains(&s.indicator_substring.to_lowercase())
            })
    }

    /// Matches a batch of records, emitting one event per newly observed
    /// process id. Matched pids are added to `seen`; pids already present
    /// are skipped. Shared by the poll loop and the push-based telemetry
    /// ingest, which reapplies the same matching.
    pub fn match_processes(
        &self,
        records: &[ProcessRecord],
        seen: &mut HashSet<u32>,
    ) -> Vec<ThreatEvent> {
        let mut events = Vec::new();
        for record in records {
            if seen.contains(&record.pid) {
                continue;
            }
            if let Some(signature) = self.match_record(record) {
                seen.insert(record.pid);
                events.push(ThreatEvent::new(
                    record.pid,
                    record.name.clone(),
                    record.command_line.clone(),
                    signature.id.clone(),
                    signature.kind,
                ));
            }
        }
        events
    }
}

impl Default for SignatureTable {
    fn default() -> Self {
        Self::default_table()
    }
}
