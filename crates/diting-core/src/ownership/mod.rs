// crates/diting-core/src/ownership/mod.rs
// ============================================================================
// Module: Ownership & Approval Matching
// Description: Resource-to-approver resolution and approval rule matching.
// Purpose: Select the approver set, timeout, and quorum policy for a review.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Two lookups feed CHEQ creation: the static ownership resolver maps a
//! resource to the approvers who own it, and the approval rule matcher picks
//! the review timeout, approver list, and quorum policy from the request's
//! path and risk level. Both return defensive copies; neither mutates shared
//! state after construction.

mod matcher;
mod static_map;


pub use matcher::ApprovalRule;
pub use matcher::ApprovalRuleMatch;
pub use matcher::RuleMatcher;
pub use static_map::StaticResolver;
