// crates/diting-core/src/core/decision.rs
// ============================================================================
// Module: Decision Types
// Description: Policy decision variants and the audit decision label set.
// Purpose: Replace sentinel strings with closed, serializable variants.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`DecisionKind`] is the policy engine's three-way verdict. The audit trail
//! additionally records post-review outcomes and error classifications, so
//! [`EvidenceDecision`] is the wider, closed label set written into evidence
//! records. Both serialize as stable snake_case strings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::confirmation::ConfirmationStatus;

// ============================================================================
// SECTION: Policy Decision
// ============================================================================

/// Policy evaluation verdict.
///
/// # Invariants
/// - Variants are exhaustive; there is no "unknown" policy verdict. The
///   `unknown` audit label exists only for forward-compatible readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionKind {
    /// Permit the action; the surface performs it.
    Allow,
    /// Refuse the action; the surface rejects it.
    Deny,
    /// Suspend the action pending human confirmation (CHEQ).
    Review,
}

impl DecisionKind {
    /// Returns the stable wire label for the verdict.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Review => "review",
        }
    }
}

/// Result of one policy evaluation.
///
/// # Invariants
/// - `policy_rule_id` is `default` and `decision_reason` is
///   `no matching rule, default deny` when no rule matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Verdict kind.
    pub kind: DecisionKind,
    /// Identifier of the rule that produced the verdict.
    pub policy_rule_id: String,
    /// Human-readable reason recorded in the audit trail.
    pub decision_reason: String,
}

impl Decision {
    /// Returns the default-deny decision emitted when no rule matches.
    #[must_use]
    pub fn default_deny() -> Self {
        Self {
            kind: DecisionKind::Deny,
            policy_rule_id: "default".to_string(),
            decision_reason: "no matching rule, default deny".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Evidence Decision Labels
// ============================================================================

/// Closed label set for the `decision` field of an evidence record.
///
/// # Invariants
/// - Labels are stable wire strings; audit consumers match on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceDecision {
    /// Policy allowed the action.
    Allow,
    /// Policy denied the action.
    Deny,
    /// Policy requested human review.
    Review,
    /// Review ended with approval.
    Approved,
    /// Review ended with rejection.
    Rejected,
    /// Review expired without a terminal vote.
    Expired,
    /// L0 gate: no agent identity supplied.
    L0Missing,
    /// L0 gate: identity supplied but not in the allow-list.
    L0Invalid,
    /// CHEQ creation failed while entering review.
    ReviewError,
    /// Policy engine internal error.
    Error,
    /// Reserved label for decisions this build cannot classify.
    Unknown,
}

impl EvidenceDecision {
    /// Returns the stable wire label for the decision.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Review => "review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
            Self::L0Missing => "l0_missing",
            Self::L0Invalid => "l0_invalid",
            Self::ReviewError => "review_error",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl From<ConfirmationStatus> for EvidenceDecision {
    /// Maps a confirmation status onto the audit label for its outcome.
    ///
    /// Non-terminal statuses map to [`EvidenceDecision::Review`]; the pipeline
    /// only performs this conversion once a terminal status is observed.
    fn from(status: ConfirmationStatus) -> Self {
        match status {
            ConfirmationStatus::Approved => Self::Approved,
            ConfirmationStatus::Rejected => Self::Rejected,
            ConfirmationStatus::Expired => Self::Expired,
            ConfirmationStatus::Pending | ConfirmationStatus::Delivered => Self::Review,
        }
    }
}
