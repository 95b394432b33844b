//! The execution gate: structural validation plus policy compliance.
//!
//! Both checks are independent and both must pass for a plan to be
//! executable. The policy call is bounded by a fixed timeout; a policy
//! engine that errors or times out fails closed — `policy_compliant` is
//! false and the message names the engine as unavailable. There is no
//! branch that defaults to allow on infrastructure failure.

use crate::engine::PolicyEvaluator;
use crate::rules::PlanContext;
use std::sync::Arc;
use std::time::Duration;
use sx_core::{validate_plan, CandidatePlan, GateVerdict};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Default bound on one policy-engine call.
pub const DEFAULT_POLICY_TIMEOUT: Duration = Duration::from_secs(5);

/// Combined structural + policy gate.
pub struct Gate {
    policy: Arc<dyn PolicyEvaluator>,
    policy_timeout: Duration,
}

impl Gate {
    /// Creates a gate over the given policy evaluator.
    pub fn new(policy: Arc<dyn PolicyEvaluator>) -> Self {
        Self {
            policy,
            policy_timeout: DEFAULT_POLICY_TIMEOUT,
        }
    }

    /// Overrides the policy call timeout.
    pub fn with_policy_timeout(mut self, timeout: Duration) -> Self {
        self.policy_timeout = timeout;
        self
    }

    /// Evaluates a plan for the given case and host.
    #[instrument(skip(self, plan), fields(plan = %plan.plan_id, case = %owning_case))]
    pub async fn evaluate(
        &self,
        plan: &CandidatePlan,
        owning_case: Uuid,
        hostname: &str,
    ) -> GateVerdict {
        let schema_violations = validate_plan(plan, owning_case);
        let schema_valid = schema_violations.is_empty();
        if !schema_valid {
            warn!(
                violations = schema_violations.len(),
                "Plan failed structural validation"
            );
        }

        let context = PlanContext::new(plan.clone(), hostname);
        let (policy_compliant, policy_message) =
            match tokio::time::timeout(self.policy_timeout, self.policy.evaluate(&context)).await {
                Ok(Ok(outcome)) => (outcome.compliant, outcome.message),
                Ok(Err(err)) => {
                    warn!(error = %err, "Policy engine failed, failing closed");
                    (false, format!("policy engine unavailable: {}", err))
                }
                Err(_) => {
                    warn!("Policy engine timed out, failing closed");
                    (
                        false,
                        format!(
                            "policy engine unavailable: evaluation exceeded {:?}",
                            self.policy_timeout
                        ),
                    )
                }
            };

        let verdict = GateVerdict {
            schema_valid,
            policy_compliant,
            policy_message,
            schema_violations,
        };
        info!(
            schema_valid = verdict.schema_valid,
            policy_compliant = verdict.policy_compliant,
            executable = verdict.executable(),
            "Gate verdict"
        );
        verdict
    }
}
