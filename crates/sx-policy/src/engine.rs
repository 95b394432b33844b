//! Policy evaluation engine.
//!
//! Evaluation order: the allow predicate first — if it holds, the plan is
//! compliant and deny rules are not consulted. Otherwise the matching
//! deny rules supply the human-readable message; if none match, a generic
//! denial is returned. There is no code path that defaults to allow.

use crate::rules::{PlanContext, PolicyDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors from policy evaluation infrastructure.
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    #[error("policy engine unavailable: {0}")]
    Unavailable(String),

    #[error("invalid policy document: {0}")]
    InvalidDocument(String),
}

/// Result of a policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyOutcome {
    /// Whether the plan is compliant with policy.
    pub compliant: bool,
    /// Human-readable explanation, pass or fail.
    pub message: String,
}

/// Boundary trait for policy evaluation, so the gate can be tested
/// against a degraded or unreachable engine.
#[async_trait]
pub trait PolicyEvaluator: Send + Sync {
    /// Evaluates a plan context against policy.
    async fn evaluate(&self, context: &PlanContext) -> Result<PolicyOutcome, PolicyError>;
}

/// The in-process rule-document engine.
pub struct PolicyEngine {
    document: PolicyDocument,
}

impl PolicyEngine {
    /// Creates an engine over a rule document.
    pub fn new(document: PolicyDocument) -> Self {
        Self { document }
    }

    /// Synchronous evaluation against the document.
    #[instrument(skip(self, context), fields(plan = %context.plan.plan_id, hostname = %context.hostname))]
    pub fn evaluate_document(&self, context: &PlanContext) -> PolicyOutcome {
        if self.document.allow.evaluate(context) {
            debug!("Allow predicate holds");
            return PolicyOutcome {
                compliant: true,
                message: "PASSED: plan is compliant with the safety policy".to_string(),
            };
        }

        let matched: Vec<&str> = self
            .document
            .deny
            .iter()
            .filter(|rule| rule.condition.evaluate(context))
            .map(|rule| rule.message.as_str())
            .collect();

        let message = if matched.is_empty() {
            "FAILED: plan is not permitted by policy".to_string()
        } else {
            format!("FAILED: {}", matched.join("; "))
        };

        info!(message = %message, "Plan denied by policy");
        PolicyOutcome {
            compliant: false,
            message,
        }
    }
}

#[async_trait]
impl PolicyEvaluator for PolicyEngine {
    async fn evaluate(&self, context: &PlanContext) -> Result<PolicyOutcome, PolicyError> {
        Ok(self.evaluate_document(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{DenyRule, RuleCondition};
    use std::collections::HashMap;
    use sx_core::{Action, ActionCommand, CandidatePlan, Severity, ThreatKind};

    fn plan(pid: u32, confidence: f64) -> CandidatePlan {
        CandidatePlan {
            plan_id: "plan-x".to_string(),
            case_id: "case-x".to_string(),
            generated_by: "test".to_string(),
            threat_type: ThreatKind::FilelessAttack,
            severity: Severity::Critical,
            confidence,
            actions: vec![Action {
                id: "a1".to_string(),
                command: ActionCommand::KillProcess,
                params: HashMap::from([("pid".to_string(), serde_json::json!(pid))]),
                priority: 10,
            }],
        }
    }

    #[test]
    fn test_allow_short_circuits_deny_messages() {
        let engine = PolicyEngine::new(PolicyDocument::default_document());
        let outcome = engine.evaluate_document(&PlanContext::new(plan(4242, 0.9), "ws-01"));
        assert!(outcome.compliant);
        assert!(outcome.message.starts_with("PASSED"));
    }

    #[test]
    fn test_deny_message_surfaced() {
        let engine = PolicyEngine::new(PolicyDocument::default_document());
        let outcome = engine.evaluate_document(&PlanContext::new(plan(4, 0.9), "ws-01"));
        assert!(!outcome.compliant);
        assert!(outcome.message.contains("protected system process"));
    }

    #[test]
    fn test_composite_message_when_multiple_rules_match() {
        let engine = PolicyEngine::new(PolicyDocument::default_document());
        // Protected pid AND too-low confidence.
        let outcome = engine.evaluate_document(&PlanContext::new(plan(4, 0.1), "ws-01"));
        assert!(!outcome.compliant);
        assert!(outcome.message.contains("protected system process"));
        assert!(outcome.message.contains("confidence is too low"));
    }

    #[test]
    fn test_generic_denial_when_no_deny_rule_matches() {
        // Allow predicate that never holds, with no deny rules to explain it.
        let doc = PolicyDocument {
            allow: RuleCondition::Never,
            deny: vec![],
        };
        let engine = PolicyEngine::new(doc);
        let outcome = engine.evaluate_document(&PlanContext::new(plan(1, 0.9), "ws-01"));
        assert!(!outcome.compliant);
        assert!(outcome.message.contains("not permitted by policy"));
    }

    #[tokio::test]
    async fn test_evaluator_trait_passthrough() {
        let deny = vec![DenyRule {
            name: "dc-hosts".to_string(),
            condition: RuleCondition::HostnameMatches(r"(?i)^dc\d+\..*".to_string()),
            message: "domain controllers are off limits".to_string(),
        }];
        let engine = PolicyEngine::new(PolicyDocument::from_denials(deny));

        let denied = engine
            .evaluate(&PlanContext::new(plan(1, 0.9), "dc01.corp.local"))
            .await
            .unwrap();
        assert!(!denied.compliant);

        let allowed = engine
            .evaluate(&PlanContext::new(plan(1, 0.9), "ws-99"))
            .await
            .unwrap();
        assert!(allowed.compliant);
    }
}
