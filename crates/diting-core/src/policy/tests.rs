// crates/diting-core/src/policy/tests.rs
// ============================================================================
// Module: Policy Engine Unit Tests
// Description: Unit tests for rule matching, normalization, and reload.
// Purpose: Validate first-match semantics and read-copy-update reloads.
// Dependencies: diting-core
// ============================================================================

//! ## Overview
//! Exercises rule normalization, wildcard matching, default deny, and the
//! atomic reload path with on-disk rule files.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;

use crate::core::context::RequestContext;
use crate::core::decision::DecisionKind;
use crate::interfaces::PolicyEngine;
use crate::policy::PolicyRule;
use crate::policy::RuleDecision;
use crate::policy::RulePolicyEngine;
use crate::policy::load_rules;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn rule(id: &str, subject: &str, action: &str, resource: &str, decision: RuleDecision) -> PolicyRule {
    PolicyRule {
        id: id.to_string(),
        subject: subject.to_string(),
        action: action.to_string(),
        resource: resource.to_string(),
        decision,
        reason: String::new(),
    }
}

fn ctx(subject: &str, method: &str, action: &str, resource: &str) -> RequestContext {
    RequestContext {
        agent_identity: subject.to_string(),
        method: method.to_string(),
        action: action.to_string(),
        resource: resource.to_string(),
        ..RequestContext::default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn first_matching_rule_wins() {
    let engine = RulePolicyEngine::with_rules(vec![
        rule("r1", "*", "GET", "/a", RuleDecision::Allow),
        rule("r2", "*", "GET", "/a", RuleDecision::Deny),
    ]);
    let decision = engine.evaluate(&ctx("agent", "GET", "GET", "/a")).unwrap();
    assert_eq!(decision.kind, DecisionKind::Allow);
    assert_eq!(decision.policy_rule_id, "r1");
}

#[test]
fn wildcard_and_empty_patterns_match_anything() {
    let engine = RulePolicyEngine::with_rules(vec![rule("r1", "", "*", "", RuleDecision::Review)]);
    let decision = engine.evaluate(&ctx("anyone", "POST", "write", "/x")).unwrap();
    assert_eq!(decision.kind, DecisionKind::Review);
}

#[test]
fn unmatched_request_is_default_deny() {
    let engine = RulePolicyEngine::with_rules(vec![rule("r1", "u1", "GET", "/a", RuleDecision::Allow)]);
    let decision = engine.evaluate(&ctx("u2", "GET", "GET", "/b")).unwrap();
    assert_eq!(decision.kind, DecisionKind::Deny);
    assert_eq!(decision.policy_rule_id, "default");
    assert_eq!(decision.decision_reason, "no matching rule, default deny");
}

#[test]
fn empty_action_normalizes_to_method() {
    let engine = RulePolicyEngine::with_rules(vec![rule("r1", "*", "GET", "*", RuleDecision::Allow)]);
    let decision = engine.evaluate(&ctx("a", "GET", "", "/r")).unwrap();
    assert_eq!(decision.kind, DecisionKind::Allow);
}

#[test]
fn empty_resource_normalizes_to_target_then_wildcard() {
    let engine =
        RulePolicyEngine::with_rules(vec![rule("r1", "*", "*", "http://up/x", RuleDecision::Allow)]);
    let mut context = ctx("a", "GET", "GET", "");
    context.target_url = "http://up/x".to_string();
    assert_eq!(engine.evaluate(&context).unwrap().kind, DecisionKind::Allow);

    // No resource and no target: only a wildcard resource pattern can match.
    let engine = RulePolicyEngine::with_rules(vec![rule("r2", "*", "*", "*", RuleDecision::Allow)]);
    let context = ctx("a", "GET", "GET", "");
    assert_eq!(engine.evaluate(&context).unwrap().kind, DecisionKind::Allow);
}

#[test]
fn empty_subject_matches_wildcard_subject_pattern() {
    let engine = RulePolicyEngine::with_rules(vec![rule("r1", "*", "GET", "*", RuleDecision::Allow)]);
    let decision = engine.evaluate(&ctx("", "GET", "GET", "/r")).unwrap();
    assert_eq!(decision.kind, DecisionKind::Allow);
}

#[test]
fn empty_reason_and_id_are_synthesized() {
    let mut anonymous = rule("", "*", "*", "*", RuleDecision::Review);
    anonymous.reason = String::new();
    let engine = RulePolicyEngine::with_rules(vec![anonymous]);
    let decision = engine.evaluate(&ctx("a", "GET", "GET", "/r")).unwrap();
    assert_eq!(decision.policy_rule_id, "rule_review");
    assert_eq!(decision.decision_reason, "review by rule ");
}

#[test]
fn load_rules_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let rules = load_rules(&dir.path().join("absent.yaml")).unwrap();
    assert!(rules.is_empty());
}

#[test]
fn load_rules_parses_yaml_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");
    fs::write(
        &path,
        "rules:\n  - id: r1\n    action: GET\n    decision: allow\n  - id: r2\n    decision: deny\n    reason: nope\n",
    )
    .unwrap();
    let rules = load_rules(&path).unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].id, "r1");
    assert_eq!(rules[1].reason, "nope");
}

#[test]
fn reload_swaps_rules_and_failed_reload_keeps_current() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.yaml");
    fs::write(&path, "rules:\n  - id: r1\n    decision: deny\n").unwrap();
    let engine = RulePolicyEngine::from_file(&path).unwrap();
    assert_eq!(engine.evaluate(&ctx("a", "GET", "GET", "/r")).unwrap().policy_rule_id, "r1");

    fs::write(&path, "rules:\n  - id: r2\n    decision: allow\n").unwrap();
    assert_eq!(engine.reload().unwrap(), 1);
    assert_eq!(engine.evaluate(&ctx("a", "GET", "GET", "/r")).unwrap().policy_rule_id, "r2");

    fs::write(&path, "rules: [not, a, rule").unwrap();
    assert!(engine.reload().is_err());
    // The previous ruleset stays in effect after a failed reload.
    assert_eq!(engine.evaluate(&ctx("a", "GET", "GET", "/r")).unwrap().policy_rule_id, "r2");
}
