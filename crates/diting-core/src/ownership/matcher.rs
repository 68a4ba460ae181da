// crates/diting-core/src/ownership/matcher.rs
// ============================================================================
// Module: Approval Rule Matcher
// Description: Path/risk-indexed selection of timeout, approvers, and quorum.
// Purpose: Resolve per-request approval parameters for CHEQ creation.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Approval rules are matched in declaration order: an entry matches when its
//! path prefix is empty or prefixes the request path, and its risk level is
//! empty or equals the request's risk level. Missing timeout or approver
//! fields in the matched entry fall back to the default match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::confirmation::ApprovalPolicy;

// ============================================================================
// SECTION: Match Result
// ============================================================================

/// Resolved approval parameters for one review.
///
/// # Invariants
/// - `timeout_secs` is greater than zero once defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalRuleMatch {
    /// Review timeout in seconds.
    pub timeout_secs: u64,
    /// Approver identifiers to fan out to.
    pub approver_ids: Vec<String>,
    /// Quorum policy applied to positive votes.
    pub approval_policy: ApprovalPolicy,
}

// ============================================================================
// SECTION: Rules & Matcher
// ============================================================================

/// One ordered approval rule.
///
/// # Invariants
/// - Empty `path_prefix` and `risk_level` match any request.
/// - `timeout_secs == 0` and an empty approver list mean "use defaults".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApprovalRule {
    /// Path prefix the rule applies to; empty matches all paths.
    pub path_prefix: String,
    /// Risk level the rule applies to; empty matches all levels.
    pub risk_level: String,
    /// Review timeout in seconds; zero falls back to the default.
    pub timeout_secs: u64,
    /// Approver identifiers; empty falls back to the default list.
    pub approver_ids: Vec<String>,
    /// Quorum policy; normalized so anything but `all` is `any`.
    pub approval_policy: ApprovalPolicy,
}

/// Ordered approval rule matcher with a default fallback.
///
/// # Invariants
/// - Rules are evaluated in declaration order; the first match wins.
/// - Results are defensive copies.
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    /// Ordered rule entries.
    rules: Vec<ApprovalRule>,
    /// Fallback parameters when no rule matches or fields are missing.
    default_match: ApprovalRuleMatch,
}

impl RuleMatcher {
    /// Creates a matcher from ordered rules and the default parameters.
    #[must_use]
    pub fn new(rules: Vec<ApprovalRule>, default_match: ApprovalRuleMatch) -> Self {
        Self {
            rules,
            default_match,
        }
    }

    /// Matches the first rule applying to `(path, risk_level)`.
    ///
    /// Missing timeout or approver fields in the matched entry fall back to
    /// the default match; with no matching rule the default is returned.
    #[must_use]
    pub fn matches(&self, path: &str, risk_level: &str) -> ApprovalRuleMatch {
        for rule in &self.rules {
            if !rule.path_prefix.is_empty() && !path.starts_with(&rule.path_prefix) {
                continue;
            }
            if !rule.risk_level.is_empty() && rule.risk_level != risk_level {
                continue;
            }
            let mut matched = ApprovalRuleMatch {
                timeout_secs: rule.timeout_secs,
                approver_ids: rule.approver_ids.clone(),
                approval_policy: rule.approval_policy,
            };
            if matched.timeout_secs == 0 {
                matched.timeout_secs = self.default_match.timeout_secs;
            }
            if matched.approver_ids.is_empty() {
                matched.approver_ids = self.default_match.approver_ids.clone();
            }
            return matched;
        }
        self.default_match.clone()
    }
}
