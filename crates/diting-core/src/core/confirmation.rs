// crates/diting-core/src/core/confirmation.rs
// ============================================================================
// Module: CHEQ Confirmation Model
// Description: ConfirmationObject, lifecycle status, and quorum policy.
// Purpose: Encode the persistent record of one human-in-the-loop review.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! A [`ConfirmationObject`] records one suspended action awaiting human
//! confirmation. Objects are exclusively owned by the confirmation store and
//! handed out by value; all transitions run through the CHEQ engine, which
//! enforces the lifecycle invariants:
//!
//! - terminal states (`approved`, `rejected`, `expired`) are sticky;
//! - `approved` is reachable only once the quorum condition holds;
//! - expiry is lazy, applied by any read after `expires_at` has passed;
//! - a single negative vote rejects regardless of quorum policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Status & Policy
// ============================================================================

/// Lifecycle status of a confirmation object.
///
/// # Invariants
/// - `Approved`, `Rejected`, and `Expired` are terminal and sticky.
/// - `Delivered` is informational; transition logic treats it like `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    /// Created and awaiting votes.
    Pending,
    /// Fanned out to approvers; still awaiting votes.
    Delivered,
    /// Quorum reached; the action may proceed.
    Approved,
    /// At least one negative vote; the action is refused.
    Rejected,
    /// Deadline passed without a terminal vote.
    Expired,
}

impl ConfirmationStatus {
    /// Returns whether the status is terminal (no further transitions).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Expired)
    }

    /// Returns the stable wire label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }
}

/// Quorum policy applied to positive votes.
///
/// # Invariants
/// - Unrecognized configuration values normalize to [`ApprovalPolicy::Any`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalPolicy {
    /// A single approval suffices.
    #[default]
    Any,
    /// Every listed approver must approve.
    All,
}

impl ApprovalPolicy {
    /// Parses a configuration value; anything that is not `all` is `Any`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value == "all" { Self::All } else { Self::Any }
    }

    /// Returns the stable wire label for the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::All => "all",
        }
    }
}

// ============================================================================
// SECTION: Confirmation Object
// ============================================================================

/// Classification tag for operation approvals created by the pipeline.
pub const KIND_OPERATION_APPROVAL: &str = "operation_approval";

/// Persistent record of one review request.
///
/// # Invariants
/// - `id` is unique and opaque; `trace_id` correlates to the audit trail.
/// - `approved_by` only grows, never contains duplicates, and is only
///   meaningful under [`ApprovalPolicy::All`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationObject {
    /// Unique opaque identifier.
    pub id: String,
    /// Correlation key into the audit trail.
    pub trace_id: String,
    /// Current lifecycle status.
    pub status: ConfirmationStatus,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Deadline after which any read transitions the object to expired.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    /// Resource the suspended action targets.
    #[serde(default)]
    pub resource: String,
    /// Action verb of the suspended action.
    #[serde(default)]
    pub action: String,
    /// Human-readable summary shown to approvers.
    #[serde(default)]
    pub summary: String,
    /// Ordered approver identifiers the object was fanned out to.
    #[serde(default)]
    pub confirmer_ids: Vec<String>,
    /// Quorum policy applied to positive votes.
    #[serde(default)]
    pub approval_policy: ApprovalPolicy,
    /// Approvers who have voted yes so far (quorum accounting under `all`).
    #[serde(default)]
    pub approved_by: Vec<String>,
    /// Classification tag, e.g. `operation_approval`.
    #[serde(default, rename = "type")]
    pub kind: String,
}

impl ConfirmationObject {
    /// Returns whether the object is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns whether the deadline has passed at `now`.
    #[must_use]
    pub fn is_past_expiry(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    /// Returns the quorum condition under the object's approval policy.
    #[must_use]
    pub fn quorum_met(&self) -> bool {
        match self.approval_policy {
            ApprovalPolicy::Any => !self.approved_by.is_empty(),
            ApprovalPolicy::All => self.approved_by.len() >= self.confirmer_ids.len(),
        }
    }
}

// ============================================================================
// SECTION: Create Input
// ============================================================================

/// Input for creating a confirmation object.
///
/// # Invariants
/// - `expires_at` falls back to `now + default timeout` when unset.
/// - `confirmer_ids` may be overridden by the ownership resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateInput {
    /// Correlation key into the audit trail.
    pub trace_id: String,
    /// Resource the suspended action targets.
    pub resource: String,
    /// Action verb of the suspended action.
    pub action: String,
    /// Human-readable summary shown to approvers.
    pub summary: String,
    /// Explicit deadline; engine default applies when `None`.
    pub expires_at: Option<OffsetDateTime>,
    /// Requested approver identifiers.
    pub confirmer_ids: Vec<String>,
    /// Classification tag, e.g. [`KIND_OPERATION_APPROVAL`].
    pub kind: String,
    /// Quorum policy for this request; engine default applies when `None`.
    pub approval_policy: Option<ApprovalPolicy>,
}
