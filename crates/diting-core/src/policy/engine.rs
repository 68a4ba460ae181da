// crates/diting-core/src/policy/engine.rs
// ============================================================================
// Module: Rule Policy Engine
// Description: First-match rule evaluator with read-copy-update reload.
// Purpose: Provide the built-in policy decision point for the pipeline.
// Dependencies: crate::core, crate::interfaces, crate::policy::rules
// ============================================================================

//! ## Overview
//! [`RulePolicyEngine`] iterates the ruleset in declaration order and returns
//! the first match; an unmatched request is a default deny. The ruleset is
//! held behind `RwLock<Arc<Vec<_>>>`: readers clone the `Arc` and evaluate
//! without holding the lock, and `reload` parses the file first and only then
//! swaps the pointer, so a failed reload leaves the current rules in place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::RwLock;

use crate::core::context::RequestContext;
use crate::core::decision::Decision;
use crate::core::decision::DecisionKind;
use crate::interfaces::PolicyEngine;
use crate::interfaces::PolicyError;
use crate::policy::rules::PolicyRule;
use crate::policy::rules::load_rules;

// ============================================================================
// SECTION: Rule Policy Engine
// ============================================================================

/// Built-in rule-based policy engine.
///
/// # Invariants
/// - Evaluations always observe a complete ruleset (atomic pointer swap).
/// - A failed reload never replaces the current rules.
pub struct RulePolicyEngine {
    /// Current ruleset; swapped wholesale on reload.
    rules: RwLock<Arc<Vec<PolicyRule>>>,
    /// Rule file path; `None` for rulesets injected directly (tests, embeds).
    path: Option<PathBuf>,
}

impl RulePolicyEngine {
    /// Creates an engine from a rules file path.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Load`] when the initial load fails.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, PolicyError> {
        let path = path.into();
        let rules = load_rules(&path)?;
        Ok(Self {
            rules: RwLock::new(Arc::new(rules)),
            path: Some(path),
        })
    }

    /// Creates an engine over an in-memory ruleset.
    #[must_use]
    pub fn with_rules(rules: Vec<PolicyRule>) -> Self {
        Self {
            rules: RwLock::new(Arc::new(rules)),
            path: None,
        }
    }

    /// Re-reads the rule file and atomically swaps the ruleset.
    ///
    /// Engines without a backing file keep their injected rules. Returns the
    /// number of active rules after the reload.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Load`] when the file cannot be read or parsed;
    /// the current rules stay in effect.
    pub fn reload(&self) -> Result<usize, PolicyError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot().len());
        };
        let rules = load_rules(path)?;
        let count = rules.len();
        let next = Arc::new(rules);
        match self.rules.write() {
            Ok(mut guard) => *guard = next,
            Err(_) => return Err(PolicyError::Load("rule lock poisoned".to_string())),
        }
        Ok(count)
    }

    /// Returns the current ruleset snapshot.
    fn snapshot(&self) -> Arc<Vec<PolicyRule>> {
        match self.rules.read() {
            Ok(guard) => Arc::clone(&guard),
            // A poisoned lock still holds a complete ruleset.
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl PolicyEngine for RulePolicyEngine {
    fn evaluate(&self, ctx: &RequestContext) -> Result<Decision, PolicyError> {
        let subject = if ctx.agent_identity.is_empty() { "*" } else { &ctx.agent_identity };
        let action = if ctx.action.is_empty() { &ctx.method } else { &ctx.action };
        let resource = {
            let fallback = ctx.resource_or_target();
            if fallback.is_empty() { "*" } else { fallback }
        };

        let rules = self.snapshot();
        for rule in rules.iter() {
            if !rule.matches(subject, action, resource) {
                continue;
            }
            let reason = if rule.reason.is_empty() {
                format!("{} by rule {}", rule.decision.as_str(), rule.id)
            } else {
                rule.reason.clone()
            };
            let rule_id = if rule.id.is_empty() {
                format!("rule_{}", rule.decision.as_str())
            } else {
                rule.id.clone()
            };
            return Ok(Decision {
                kind: rule.decision.kind(),
                policy_rule_id: rule_id,
                decision_reason: reason,
            });
        }
        Ok(Decision::default_deny())
    }
}

// ============================================================================
// SECTION: Stub Engine
// ============================================================================

/// Placeholder policy engine that allows everything.
///
/// # Invariants
/// - Only for wiring a gateway before a ruleset is authored; never the
///   default in configuration-driven builds.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPolicyEngine;

impl PolicyEngine for StubPolicyEngine {
    fn evaluate(&self, _ctx: &RequestContext) -> Result<Decision, PolicyError> {
        Ok(Decision {
            kind: DecisionKind::Allow,
            policy_rule_id: "stub".to_string(),
            decision_reason: "stub engine allows all".to_string(),
        })
    }
}
