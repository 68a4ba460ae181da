// crates/diting-core/src/core/evidence.rs
// ============================================================================
// Module: Audit Evidence
// Description: One structured, append-only audit record.
// Purpose: Record every decision the pipeline makes, correlated by trace id.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! An [`Evidence`] is one line of the audit trail: who asked, what was asked,
//! what was decided, and under which rule. Records are append-only and never
//! updated in place; within one trace they are appended in causal order.
//! Redaction is a store concern and always operates on a copy, so in-memory
//! records stay intact.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::decision::EvidenceDecision;

// ============================================================================
// SECTION: Evidence Record
// ============================================================================

/// One structured audit record.
///
/// # Invariants
/// - `trace_id` is non-empty for records produced by the pipeline.
/// - `confirmer` is the comma-joined approver id list captured at terminal
///   time, not a single voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// Correlation key shared by every record of one request.
    pub trace_id: String,
    /// Optional span identifier for finer-grained correlation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// Agent identity the request carried (possibly empty).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_id: String,
    /// Identifier of the policy rule behind the decision.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_rule_id: String,
    /// Human-readable decision reason.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub decision_reason: String,
    /// Decision label for this record.
    pub decision: EvidenceDecision,
    /// CHEQ status at the time of the record, when review was involved.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cheq_status: String,
    /// Comma-joined approver identifiers at terminal time.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confirmer: String,
    /// Record instant; monotone within a trace.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Resource of the evaluated action.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource: String,
    /// Action verb of the evaluated action.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
}

/// Field names eligible for store-side redaction.
///
/// The set mirrors the evidence wire fields that can carry identifying or
/// sensitive material; `decision` and `timestamp` are never redacted.
pub const REDACTABLE_FIELDS: &[&str] = &[
    "agent_id",
    "decision_reason",
    "trace_id",
    "policy_rule_id",
    "confirmer",
    "resource",
    "action",
];

impl Evidence {
    /// Returns a copy with the named fields replaced by `***`.
    ///
    /// Unknown field names are ignored. The receiver is never mutated; stores
    /// call this before serialization so the in-memory record stays intact.
    #[must_use]
    pub fn redacted(&self, fields: &[String]) -> Self {
        let mut copy = self.clone();
        for field in fields {
            match field.as_str() {
                "agent_id" => copy.agent_id = "***".to_string(),
                "decision_reason" => copy.decision_reason = "***".to_string(),
                "trace_id" => copy.trace_id = "***".to_string(),
                "policy_rule_id" => copy.policy_rule_id = "***".to_string(),
                "confirmer" => copy.confirmer = "***".to_string(),
                "resource" => copy.resource = "***".to_string(),
                "action" => copy.action = "***".to_string(),
                _ => {}
            }
        }
        copy
    }
}
