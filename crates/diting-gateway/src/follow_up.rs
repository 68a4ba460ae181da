// crates/diting-gateway/src/follow_up.rs
// ============================================================================
// Module: Follow-Up & Diagnostics Surface
// Description: Health probes, audit queries, approvals, and callbacks.
// Purpose: Let humans and tooling act on pending confirmations and inspect
//          the audit trail.
// Dependencies: axum, diting-core, serde_json
// ============================================================================

//! ## Overview
//! These handlers sit next to the main surfaces: liveness/readiness probes,
//! `GET /debug/audit` for trace inspection, `GET|POST /cheq/approve` for
//! out-of-band human votes (mapping CHEQ outcomes to 404/409/500), the
//! delivery card callback that turns button clicks into votes, and the
//! `POST /init_permission` acceptance stub.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use diting_core::CheqError;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

use crate::state::GatewayState;

// ============================================================================
// SECTION: Probes
// ============================================================================

/// `GET /healthz`.
pub(crate) async fn healthz() -> &'static str {
    "ok"
}

/// `GET /readyz`.
pub(crate) async fn readyz() -> &'static str {
    "ready"
}

// ============================================================================
// SECTION: Audit Debug
// ============================================================================

/// Query string of `GET /debug/audit`.
#[derive(Debug, Deserialize)]
pub(crate) struct AuditQuery {
    /// Trace id to look up.
    #[serde(default)]
    trace_id: String,
}

/// `GET /debug/audit?trace_id=X`.
pub(crate) async fn debug_audit(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<AuditQuery>,
) -> Response {
    if query.trace_id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing trace_id" })))
            .into_response();
    }
    match state.evidence.query_by_trace_id(&query.trace_id) {
        Ok(records) => Json(records).into_response(),
        Err(err) => {
            tracing::error!(trace_id = %query.trace_id, error = %err, "audit query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "query failed" })))
                .into_response()
        }
    }
}

// ============================================================================
// SECTION: Human Approval
// ============================================================================

/// Query string of `GET|POST /cheq/approve`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApproveQuery {
    /// Confirmation object id.
    #[serde(default)]
    id: String,
    /// Vote: `true`/`1`/`yes` approve, anything else rejects.
    #[serde(default)]
    approved: String,
    /// Voting approver id (quorum accounting under `all`).
    #[serde(default)]
    by: String,
}

/// `GET|POST /cheq/approve?id=X&approved=Y&by=Z`.
pub(crate) async fn cheq_approve(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<ApproveQuery>,
) -> Response {
    if query.id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing id" }))).into_response();
    }
    let approved = matches!(query.approved.as_str(), "true" | "1" | "yes");
    match state.cheq.submit(&query.id, approved, &query.by).await {
        Ok(()) => Json(json!({ "ok": true, "approved": approved })).into_response(),
        Err(CheqError::NotFound) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
        }
        Err(CheqError::AlreadyProcessed | CheqError::Expired) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": "already processed or expired" })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(id = %query.id, error = %err, "cheq submit failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "submit failed" })))
                .into_response()
        }
    }
}

// ============================================================================
// SECTION: Delivery Callback
// ============================================================================

/// Extracts `{request_id, action}` from a card callback payload.
///
/// The action value arrives either as an object or as a JSON-encoded string,
/// depending on the delivery transport.
#[must_use]
pub(crate) fn parse_card_action(callback: &Value) -> Option<(String, String)> {
    let action = callback.get("action")?;
    let value = match action.get("value") {
        Some(Value::Object(map)) => Value::Object(map.clone()),
        Some(Value::String(raw)) if !raw.is_empty() => serde_json::from_str(raw).ok()?,
        _ => return None,
    };
    let request_id = value.get("request_id")?.as_str()?.to_string();
    if request_id.is_empty() {
        return None;
    }
    let verdict = value.get("action").and_then(Value::as_str).unwrap_or_default().to_string();
    Some((request_id, verdict))
}

/// `POST /feishu/card` delivery callback.
pub(crate) async fn feishu_card(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<Value>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(Json(callback)) = body else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some((request_id, verdict)) = parse_card_action(&callback) else {
        return Json(json!({ "toast": { "type": "info", "content": "ignored" } })).into_response();
    };
    let approved = verdict == "approve";
    match state.cheq.submit(&request_id, approved, "").await {
        Ok(()) => {
            let content = if approved { "approved" } else { "rejected" };
            Json(json!({ "toast": { "type": "success", "content": content } })).into_response()
        }
        Err(CheqError::NotFound | CheqError::Expired | CheqError::AlreadyProcessed) => Json(
            json!({ "toast": { "type": "warning", "content": "request already settled or expired" } }),
        )
        .into_response(),
        Err(err) => {
            tracing::error!(id = %request_id, error = %err, "card callback submit failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// SECTION: Permission Stub
// ============================================================================

/// Body of `POST /init_permission`.
#[derive(Debug, Deserialize)]
pub(crate) struct InitPermissionRequest {
    /// Agent identifier.
    #[serde(default)]
    pub agent_id: String,
    /// Owner identifier.
    #[serde(default)]
    pub owner_id: String,
}

/// `POST /init_permission` acceptance stub.
pub(crate) async fn init_permission(
    body: Result<Json<InitPermissionRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid json" }))).into_response();
    };
    tracing::info!(agent_id = %request.agent_id, owner_id = %request.owner_id, "permission init accepted");
    Json(json!({ "ok": true })).into_response()
}
