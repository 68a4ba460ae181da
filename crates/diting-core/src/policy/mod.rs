// crates/diting-core/src/policy/mod.rs
// ============================================================================
// Module: Policy Engine
// Description: Ordered-rule policy evaluation with atomic reload.
// Purpose: Classify requests into allow/deny/review from a YAML ruleset.
// Dependencies: crate::core, crate::interfaces, serde_yaml
// ============================================================================

//! ## Overview
//! The policy engine evaluates `(subject, action, resource)` against an
//! ordered ruleset; the first matching rule wins and an unmatched request is
//! a default deny. Reloads swap the whole ruleset atomically so concurrent
//! evaluations never observe a partially replaced list.

mod engine;
mod rules;

#[cfg(test)]
mod tests;

pub use engine::RulePolicyEngine;
pub use engine::StubPolicyEngine;
pub use rules::PolicyRule;
pub use rules::RuleDecision;
pub use rules::load_rules;
