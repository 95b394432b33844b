//! # sx-policy
//!
//! Declarative policy compliance and the execution gate for Sentinel X.
//!
//! Policy is a rule document read at startup: one allow predicate and a
//! set of deny rules with human-readable messages. The [`gate::Gate`]
//! combines policy evaluation with structural plan validation into the
//! [`sx_core::GateVerdict`] that decides whether a plan may ever execute.
//! An unreachable policy engine always fails closed.

pub mod engine;
pub mod gate;
pub mod rules;

pub use engine::{PolicyEngine, PolicyError, PolicyEvaluator, PolicyOutcome};
pub use gate::Gate;
pub use rules::{DenyRule, PlanContext, PolicyDocument, RuleCondition};
