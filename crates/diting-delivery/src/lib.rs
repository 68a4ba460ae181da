// crates/diting-delivery/src/lib.rs
// ============================================================================
// Module: Diting Delivery
// Description: Feishu delivery provider for confirmation fan-out.
// Purpose: Deliver pending confirmations to human approvers over IM.
// Dependencies: diting-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The Feishu provider implements the pipeline's delivery contract: it sends
//! each pending confirmation to the approver set as an interactive card (or a
//! text message with approval links), retries with bounded exponential
//! backoff, and falls back to the configured group chat when direct delivery
//! keeps failing. Card clicks come back through the gateway's callback
//! surface; this crate never talks to CHEQ directly.
//!
//! Delivery is best-effort by contract: every failure here leaves the
//! confirmation pending and approvable through the backup URL.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod card;
mod feishu;

pub use card::approval_card;
pub use card::approval_links;
pub use feishu::FeishuProvider;
pub use feishu::FeishuProviderConfig;
