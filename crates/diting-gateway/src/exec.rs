// crates/diting-gateway/src/exec.rs
// ============================================================================
// Module: Exec Authorization Surface
// Description: Synchronous POST /auth/exec endpoint.
// Purpose: Gate shell execution on the shared pipeline.
// Dependencies: axum, diting-core, uuid
// ============================================================================

//! ## Overview
//! Node agents call `POST /auth/exec` before running a command. The request
//! maps onto the shared context with method `EXEC`, the command line as the
//! target, and an `exec:`-prefixed action; the response carries the decision
//! plus review metadata (`cheq_id`, `approval_timeout_sec`) so a denied
//! caller can follow up out of band.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use diting_core::AuthOutcome;
use diting_core::EXT_COMMAND_LINE;
use diting_core::EXT_WORKING_DIR;
use diting_core::RequestContext;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::state::GatewayState;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// JSON body of `POST /auth/exec`.
///
/// # Invariants
/// - `subject`, when present, overrides header-derived identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecAuthRequest {
    /// Subject identity of the requesting agent.
    #[serde(default)]
    pub subject: String,
    /// Action verb; normalized to an `exec:` prefix.
    #[serde(default)]
    pub action: String,
    /// Resource identifier, e.g. `local://<hostname>`.
    #[serde(default)]
    pub resource: String,
    /// Extension context (`risk_level`, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Command line the agent wants to run.
    #[serde(default)]
    pub command_line: String,
    /// Working directory of the command.
    #[serde(default)]
    pub working_dir: String,
    /// Caller-supplied trace id.
    #[serde(default)]
    pub trace_id: String,
}

// ============================================================================
// SECTION: Context Construction
// ============================================================================

/// Builds the request context for one exec authorization.
#[must_use]
pub fn build_exec_context(request: &ExecAuthRequest, agent_identity: &str) -> RequestContext {
    let action = if request.action.is_empty() || request.action.starts_with("exec:") {
        request.action.clone()
    } else {
        format!("exec:{}", request.action)
    };
    let mut extensions = request.context.clone();
    if !request.command_line.is_empty() {
        extensions.insert(EXT_COMMAND_LINE.to_string(), request.command_line.clone());
    }
    if !request.working_dir.is_empty() {
        extensions.insert(EXT_WORKING_DIR.to_string(), request.working_dir.clone());
    }
    RequestContext {
        agent_identity: agent_identity.to_string(),
        method: "EXEC".to_string(),
        target_url: request.command_line.clone(),
        resource: request.resource.clone(),
        action,
        headers: BTreeMap::new(),
        extensions,
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `POST /auth/exec` handler.
pub(crate) async fn exec_auth(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    body: Result<Json<ExecAuthRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let Ok(Json(request)) = body else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid json" }))).into_response();
    };

    let mut trace_id = request.trace_id.clone();
    for header in ["traceparent", "x-trace-id"] {
        if !trace_id.is_empty() {
            break;
        }
        trace_id = headers
            .get(header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
    }
    if trace_id.is_empty() {
        trace_id = Uuid::new_v4().to_string();
    }

    let mut agent_identity = headers
        .get("x-agent-token")
        .or_else(|| headers.get("authorization"))
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    if !request.subject.is_empty() {
        agent_identity = request.subject.clone();
    }

    let ctx = build_exec_context(&request, &agent_identity);
    let decision = match state.pipeline.evaluate_blocking(&trace_id, &ctx).await {
        Ok(decision) => decision,
        Err(err) => {
            tracing::error!(trace_id, error = %err, "exec evaluation failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "evaluate failed" })),
            )
                .into_response();
        }
    };
    let status = if decision.decision == AuthOutcome::Allow {
        StatusCode::OK
    } else {
        StatusCode::FORBIDDEN
    };
    let mut response = (status, Json(decision)).into_response();
    if let Ok(value) = axum::http::HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("x-trace-id", value);
    }
    response
}
