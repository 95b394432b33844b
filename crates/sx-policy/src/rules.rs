//! Declarative policy rule document.
//!
//! A [`PolicyDocument`] is one allow predicate plus a list of deny rules,
//! each carrying a human-readable message. The document is deserialized
//! from YAML at startup; changing it requires a restart.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sx_core::{ActionCommand, CandidatePlan, Severity, ThreatKind};
use tracing::warn;

/// Everything a rule can look at when evaluating a plan.
#[derive(Debug, Clone)]
pub struct PlanContext {
    /// The candidate plan under evaluation.
    pub plan: CandidatePlan,
    /// Hostname of the machine the plan would run against.
    pub hostname: String,
}

impl PlanContext {
    /// Creates an evaluation context.
    pub fn new(plan: CandidatePlan, hostname: impl Into<String>) -> Self {
        Self {
            plan,
            hostname: hostname.into(),
        }
    }

    /// Process ids targeted by the plan's kill_process actions.
    fn targeted_pids(&self) -> Vec<u32> {
        self.plan
            .actions
            .iter()
            .filter(|a| a.command == ActionCommand::KillProcess)
            .filter_map(|a| a.param_u64("pid"))
            .map(|pid| pid as u32)
            .collect()
    }
}

/// A composable policy condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCondition {
    /// Every action command in the plan is in the given set.
    AllCommandsIn(Vec<ActionCommand>),
    /// At least one action command in the plan is in the given set.
    AnyCommandIn(Vec<ActionCommand>),
    /// A kill_process action targets one of the listed process ids.
    TargetsProtectedPid { pids: Vec<u32> },
    /// The originating hostname is in the given list (case-insensitive).
    HostnameIn(Vec<String>),
    /// The originating hostname matches the regex pattern. An invalid
    /// pattern never matches.
    HostnameMatches(String),
    /// Plan confidence is strictly below the threshold.
    ConfidenceBelow(f64),
    /// Plan severity is at or above the given level.
    SeverityAtLeast(Severity),
    /// Plan threat type is in the given set.
    ThreatTypeIn(Vec<ThreatKind>),
    /// All sub-conditions hold.
    All(Vec<RuleCondition>),
    /// Any sub-condition holds.
    Any(Vec<RuleCondition>),
    /// The sub-condition does not hold.
    Not(Box<RuleCondition>),
    Always,
    Never,
}

impl RuleCondition {
    /// Evaluates this condition against a plan context.
    pub fn evaluate(&self, context: &PlanContext) -> bool {
        match self {
            RuleCondition::AllCommandsIn(commands) => context
                .plan
                .actions
                .iter()
                .all(|a| commands.contains(&a.command)),

            RuleCondition::AnyCommandIn(commands) => context
                .plan
                .actions
                .iter()
                .any(|a| commands.contains(&a.command)),

            RuleCondition::TargetsProtectedPid { pids } => context
                .targeted_pids()
                .iter()
                .any(|pid| pids.contains(pid)),

            RuleCondition::HostnameIn(hosts) => hosts
                .iter()
                .any(|h| h.eq_ignore_ascii_case(&context.hostname)),

            RuleCondition::HostnameMatches(pattern) => match Regex::new(pattern) {
                Ok(re) => re.is_match(&context.hostname),
                Err(err) => {
                    warn!(pattern, error = %err, "Invalid hostname pattern in policy");
                    false
                }
            },

            RuleCondition::ConfidenceBelow(threshold) => context.plan.confidence < *threshold,

            RuleCondition::SeverityAtLeast(level) => context.plan.severity >= *level,

            RuleCondition::ThreatTypeIn(kinds) => kinds.contains(&context.plan.threat_type),

            RuleCondition::All(conditions) => conditions.iter().all(|c| c.evaluate(context)),

            RuleCondition::Any(conditions) => conditions.iter().any(|c| c.evaluate(context)),

            RuleCondition::Not(condition) => !condition.evaluate(context),

            RuleCondition::Always => true,

            RuleCondition::Never => false,
        }
    }
}

/// A deny rule: when its condition matches, its message explains why.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenyRule {
    /// Rule name for logs and audit.
    pub name: String,
    /// When this condition holds, the plan is denied.
    pub condition: RuleCondition,
    /// Human-readable denial message.
    pub message: String,
}

/// The policy rule document: one allow predicate, N deny rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    /// The plan is compliant when this predicate holds.
    pub allow: RuleCondition,
    /// Consulted for messages when the allow predicate does not hold.
    #[serde(default)]
    pub deny: Vec<DenyRule>,
}

impl PolicyDocument {
    /// Builds a document whose allow predicate is the negation of the
    /// union of the deny conditions — deny rules and the allow rule stay
    /// in lockstep by construction.
    pub fn from_denials(deny: Vec<DenyRule>) -> Self {
        let allow = RuleCondition::Not(Box::new(RuleCondition::Any(
            deny.iter().map(|d| d.condition.clone()).collect(),
        )));
        Self { allow, deny }
    }

    /// The built-in safety policy used when no document is configured.
    pub fn default_document() -> Self {
        Self::from_denials(vec![
            DenyRule {
                name: "protected-processes".to_string(),
                condition: RuleCondition::TargetsProtectedPid { pids: vec![0, 4] },
                message: "Plan targets a protected system process".to_string(),
            },
            DenyRule {
                name: "domain-controllers".to_string(),
                condition: RuleCondition::HostnameMatches(r"(?i)^dc\d+\..*".to_string()),
                message: "Automated remediation is not permitted on domain controllers"
                    .to_string(),
            },
            DenyRule {
                name: "low-confidence".to_string(),
                condition: RuleCondition::ConfidenceBelow(0.2),
                message: "Plan confidence is too low for automated remediation".to_string(),
            },
        ])
    }

    /// Parses a document from YAML.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::default_document()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use sx_core::Action;

    fn plan_with_kill(pid: u32) -> CandidatePlan {
        CandidatePlan {
            plan_id: "plan-1".to_string(),
            case_id: "case-1".to_string(),
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
        }
    }

    #[test]
    fn test_protected_pid_condition() {
        let condition = RuleCondition::TargetsProtectedPid { pids: vec![4, 88] };
        assert!(condition.evaluate(&PlanContext::new(plan_with_kill(88), "ws-01")));
        assert!(!condition.evaluate(&PlanContext::new(plan_with_kill(999), "ws-01")));
    }

    #[test]
    fn test_hostname_conditions() {
        let ctx = PlanContext::new(plan_with_kill(1), "DC01.corp.local");

        let list = RuleCondition::HostnameIn(vec!["dc01.corp.local".to_string()]);
        assert!(list.evaluate(&ctx));

        let pattern = RuleCondition::HostnameMatches(r"(?i)^dc\d+\..*".to_string());
        assert!(pattern.evaluate(&ctx));
        assert!(!pattern.evaluate(&PlanContext::new(plan_with_kill(1), "ws-01")));

        // An invalid regex never matches rather than erroring mid-policy.
        let broken = RuleCondition::HostnameMatches("(unclosed".to_string());
        assert!(!broken.evaluate(&ctx));
    }

    #[test]
    fn test_command_set_conditions() {
        let ctx = PlanContext::new(plan_with_kill(1), "ws-01");

        assert!(RuleCondition::AllCommandsIn(vec![ActionCommand::KillProcess]).evaluate(&ctx));
        assert!(!RuleCondition::AllCommandsIn(vec![ActionCommand::IsolateHost]).evaluate(&ctx));
        assert!(RuleCondition::AnyCommandIn(vec![
            ActionCommand::KillProcess,
            ActionCommand::IsolateHost
        ])
        .evaluate(&ctx));
    }

    #[test]
    fn test_composition() {
        let ctx = PlanContext::new(plan_with_kill(1), "ws-01");
        let condition = RuleCondition::All(vec![
            RuleCondition::ConfidenceBelow(1.0),
            RuleCondition::Not(Box::new(RuleCondition::Never)),
            RuleCondition::Any(vec![RuleCondition::Never, RuleCondition::Always]),
        ]);
        assert!(condition.evaluate(&ctx));
    }

    #[test]
    fn test_default_document_denies_protected_pid() {
        let doc = PolicyDocument::default_document();
        let protected = PlanContext::new(plan_with_kill(4), "ws-01");
        let normal = PlanContext::new(plan_with_kill(4242), "ws-01");

        assert!(!doc.allow.evaluate(&protected));
        assert!(doc.allow.evaluate(&normal));
    }

    #[test]
    fn test_document_round_trips_through_yaml() {
        let doc = PolicyDocument::default_document();
        let yaml = serde_yaml::to_string(&doc).unwrap();
        let parsed = PolicyDocument::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.deny.len(), doc.deny.len());

        let ctx = PlanContext::new(plan_with_kill(4), "ws-01");
        assert!(!parsed.allow.evaluate(&ctx));
    }

    #[test]
    fn test_handwritten_yaml_document() {
        let yaml = r#"
allow:
  not:
    any:
      - targets_protected_pid: { pids: [4] }
      - hostname_matches: "(?i)^dc\\d+\\..*"
deny:
  - name: protected-processes
    condition:
      targets_protected_pid: { pids: [4] }
    message: "Plan targets a protected system process"
"#;
        let doc = PolicyDocument::from_yaml(yaml).unwrap();
        assert_eq!(doc.deny.len(), 1);
        assert!(!doc
            .allow
            .evaluate(&PlanContext::new(plan_with_kill(4), "ws-01")));
    }
}
