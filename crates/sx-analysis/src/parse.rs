//! Parse-or-fallback decoding of backend responses.
//!
//! Backends return free-form text that usually, but not always, contains
//! the requested JSON, often wrapped in a code fence. Decoding strips the
//! fence and attempts a structured parse; on failure it substitutes a
//! canonical typed fallback rather than letting a stringly value travel
//! further into the pipeline. A parse failure is therefore not a stage
//! failure — the stage already succeeded in producing a response.

use sx_core::{Action, ActionCommand, AnalystReport, CandidatePlan, ThreatKind};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

/// Context needed to build the conservative fallback plan.
#[derive(Debug, Clone)]
pub struct PlanFallbackContext {
    /// The case the plan is being produced for.
    pub case_id: Uuid,
    /// Offending process id from the originating event.
    pub process_id: u32,
    /// Threat classification fixed at detection time.
    pub kind: ThreatKind,
}

/// Removes incidental Markdown code-fence markup around a JSON payload.
pub fn strip_code_fences(text: &str) -> &str {
    let mut trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        trimmed = rest;
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        trimmed = rest;
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }
    trimmed.trim()
}

/// Decodes an Analyst stage response, falling back to the canonical
/// "processed under fallback" report when the payload does not parse.
pub fn parse_analyst_report(text: &str, backend: &str) -> AnalystReport {
    match serde_json::from_str::<AnalystReport>(strip_code_fences(text)) {
        Ok(report) => report,
        Err(err) => {
            warn!(backend, error = %err, "Analyst response did not parse, using fallback report");
            AnalystReport::fallback(backend)
        }
    }
}

/// Decodes an Expert stage response, falling back to a conservative
/// single-action plan derived from the detected event.
///
/// The fallback terminates the offending process: it is the least
/// destructive action that still addresses the threat, and it keeps the
/// pipeline moving toward human review instead of dead-ending on a
/// malformed backend response.
pub fn parse_candidate_plan(
    text: &str,
    backend: &str,
    context: &PlanFallbackContext,
) -> CandidatePlan {
    match serde_json::from_str::<CandidatePlan>(strip_code_fences(text)) {
        Ok(plan) => plan,
        Err(err) => {
            warn!(backend, error = %err, "Expert response did not parse, using fallback plan");
            fallback_plan(backend, context)
        }
    }
}

fn fallback_plan(backend: &str, context: &PlanFallbackContext) -> CandidatePlan {
    CandidatePlan {
        plan_id: format!("plan-{}", Uuid::new_v4()),
        case_id: context.case_id.to_string(),
        generated_by: format!("{} (fallback)", backend),
        threat_type: context.kind,
        severity: context.kind.default_severity(),
        confidence: 0.5,
        actions: vec![Action {
            id: "fallback-kill".to_string(),
            command: ActionCommand::KillProcess,
            params: HashMap::from([(
                "pid".to_string(),
                serde_json::json!(context.process_id),
            )]),
            priority: 10,
        }],
    }
}
