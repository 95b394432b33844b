//! Prompt assembly for the two analysis stages.
//!
//! The exact wording is not load-bearing; what matters structurally is
//! that the Expert prompt embeds the Analyst report, the plan schema, and
//! the closed command vocabulary with parameter shapes. That is advisory
//! to the backend — downstream validation runs regardless of what the
//! backend claims to have produced.

use sx_core::{ActionCommand, AlertRecord, AnalystReport};
use uuid::Uuid;

/// Builds the Analyst stage prompt for an alert.
pub fn analyst_prompt(alert: &AlertRecord) -> String {
    let alert_json = serde_json::json!({
        "hostname": alert.hostname,
        "process_id": alert.event.process_id,
        "process_name": alert.event.process_name,
        "command_line": alert.event.command_line,
        "threat_kind": alert.event.kind,
        "detected_at": alert.event.detected_at,
    });

    format!(
        "You are a security analyst. Analyze this host alert and respond with \
         ONLY a JSON object with keys \"summary\" (1-2 sentences), \
         \"technique_id\" (ATT&CK id, or \"unknown\"), and \
         \"remediation_steps\" (ordered list of manual steps).\n\
         ALERT:\n{}",
        serde_json::to_string_pretty(&alert_json).unwrap_or_default()
    )
}

/// Builds the Expert stage prompt: analyst report in, machine-readable
/// plan out.
pub fn expert_prompt(case_id: Uuid, alert: &AlertRecord, report: &AnalystReport) -> String {
    format!(
        "You are a remediation planning engine. Convert the analyst report \
         below into a machine-readable remediation plan. Respond with ONLY a \
         JSON object matching this schema:\n{}\n\
         The \"case_id\" field MUST be \"{}\".\n\
         Allowed commands and their required params:\n{}\n\
         ANALYST REPORT:\n{}\n\
         ORIGINAL ALERT:\n{}",
        plan_schema_description(),
        case_id,
        command_vocabulary(),
        serde_json::to_string_pretty(report).unwrap_or_default(),
        serde_json::json!({
            "hostname": alert.hostname,
            "process_id": alert.event.process_id,
            "process_name": alert.event.process_name,
            "command_line": alert.event.command_line,
        }),
    )
}

/// Human-readable description of the plan schema given to the Expert
/// backend.
fn plan_schema_description() -> String {
    r#"{
  "plan_id": "string, non-empty",
  "case_id": "string, must echo the provided case id",
  "generated_by": "string, your model name",
  "threat_type": "one of: fileless_attack | registry_persistence | file_staging | network_c2 | unknown",
  "severity": "one of: critical | high | medium | low",
  "confidence": "number in [0.0, 1.0]",
  "actions": [
    { "id": "string", "command": "see vocabulary", "params": { }, "priority": "integer in [0, 100], lower runs first" }
  ]
}"#
    .to_string()
}

/// The closed command vocabulary, one line per command.
fn command_vocabulary() -> String {
    ActionCommand::ALL
        .iter()
        .map(|c| format!("- {}: requires param \"{}\"", c, c.required_param()))
        .collect::<Vec<_>>()
        .join("\n")
}
