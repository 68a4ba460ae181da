// crates/diting-delivery/src/card.rs
// ============================================================================
// Module: Approval Card Payload
// Description: Interactive card and link rendering for approvals.
// Purpose: Embed the confirmation id so card clicks can reach CHEQ.
// Dependencies: diting-core, serde_json
// ============================================================================

//! ## Overview
//! Cards carry two buttons whose action values are `{request_id, action}`;
//! the gateway's callback surface parses exactly that shape and submits the
//! vote. A backup approval link is always included, so an approver can act
//! even when card interaction is unavailable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use diting_core::ConfirmationObject;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Links
// ============================================================================

/// Renders the approve/reject follow-up URLs for a confirmation id.
#[must_use]
pub fn approval_links(gateway_base_url: &str, id: &str) -> (String, String) {
    let base = gateway_base_url.trim_end_matches('/');
    (
        format!("{base}/cheq/approve?id={id}&approved=true"),
        format!("{base}/cheq/approve?id={id}&approved=false"),
    )
}

// ============================================================================
// SECTION: Card
// ============================================================================

/// Builds the interactive approval card for one confirmation.
///
/// The button values embed only the stable confirmation id, so reminders can
/// reuse the same card without regenerating approval state.
#[must_use]
pub fn approval_card(object: &ConfirmationObject, summary: &str, gateway_base_url: &str) -> Value {
    let (approve_url, _) = approval_links(gateway_base_url, &object.id);
    let expires = object
        .expires_at
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    json!({
        "config": { "wide_screen_mode": true },
        "header": {
            "template": "orange",
            "title": { "tag": "plain_text", "content": "Approval required" }
        },
        "elements": [
            {
                "tag": "div",
                "text": { "tag": "lark_md", "content": summary }
            },
            {
                "tag": "div",
                "fields": [
                    { "is_short": true, "text": { "tag": "lark_md", "content": format!("**Resource**\n{}", object.resource) } },
                    { "is_short": true, "text": { "tag": "lark_md", "content": format!("**Action**\n{}", object.action) } },
                    { "is_short": true, "text": { "tag": "lark_md", "content": format!("**Expires**\n{expires}") } },
                    { "is_short": true, "text": { "tag": "lark_md", "content": format!("**Trace**\n{}", object.trace_id) } }
                ]
            },
            {
                "tag": "action",
                "actions": [
                    {
                        "tag": "button",
                        "text": { "tag": "plain_text", "content": "Approve" },
                        "type": "primary",
                        "value": { "request_id": object.id, "action": "approve" }
                    },
                    {
                        "tag": "button",
                        "text": { "tag": "plain_text", "content": "Reject" },
                        "type": "danger",
                        "value": { "request_id": object.id, "action": "reject" }
                    }
                ]
            },
            {
                "tag": "note",
                "elements": [
                    { "tag": "plain_text", "content": format!("Backup approval link: {approve_url}") }
                ]
            }
        ]
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================
