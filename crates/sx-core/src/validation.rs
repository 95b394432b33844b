//! Structural validation of candidate plans.
//!
//! The command vocabulary is already closed at the type level; these
//! checks cover everything the type system cannot express: required
//! per-command parameters, numeric bounds, and identifier integrity.
//! Violations are collected rather than short-circuited so the operator
//! sees every problem at once.

use crate::plan::{Action, CandidatePlan};
use uuid::Uuid;

/// Inclusive bounds for an action's `priority` field.
pub const PRIORITY_RANGE: std::ops::RangeInclusive<i64> = 0..=100;

/// Validates a plan against the structural schema.
///
/// Returns the list of violations; an empty list means the plan is
/// structurally valid. `owning_case` is the case the plan was produced
/// for — a plan that names a different case is invalid.
pub fn validate_plan(plan: &CandidatePlan, owning_case: Uuid) -> Vec<String> {
    let mut violations = Vec::new();

    if plan.plan_id.trim().is_empty() {
        violations.push("plan_id must not be empty".to_string());
    }
    if plan.case_id != owning_case.to_string() {
        violations.push(format!(
            "case_id '{}' does not match owning case '{}'",
            plan.case_id, owning_case
        ));
    }
    if plan.generated_by.trim().is_empty() {
        violations.push("generated_by must not be empty".to_string());
    }
    if !plan.confidence.is_finite() || !(0.0..=1.0).contains(&plan.confidence) {
        violations.push(format!(
            "confidence {} is outside [0.0, 1.0]",
            plan.confidence
        ));
    }
    if plan.actions.is_empty() {
        violations.push("plan contains no actions".to_string());
    }

    for (index, action) in plan.actions.iter().enumerate() {
        validate_action(index, action, &mut violations);
    }

    violations
}

fn validate_action(index: usize, action: &Action, violations: &mut Vec<String>) {
    if action.id.trim().is_empty() {
        violations.push(format!("action[{}] id must not be empty", index));
    }
    if !PRIORITY_RANGE.contains(&action.priority) {
        violations.push(format!(
            "action[{}] priority {} is outside {:?}",
            index, action.priority, PRIORITY_RANGE
        ));
    }

    let param = action.command.required_param();
    match action.params.get(param) {
        None => violations.push(format!(
            "action[{}] ({}) is missing required param '{}'",
            index, action.command, param
        )),
        Some(value) => {
            let ok = if param == "pid" {
                value.as_u64().is_some()
            } else {
                value.as_str().map(|s| !s.trim().is_empty()).unwrap_or(false)
            };
            if !ok {
                violations.push(format!(
                    "action[{}] ({}) param '{}' has the wrong shape: {}",
                    index, action.command, param, value
                ));
            }
        }
    }
}
