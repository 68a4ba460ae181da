// crates/diting-gateway/src/stream.rs
// ============================================================================
// Module: Auth Stream Surface
// Description: Bidirectional WebSocket authorization stream.
// Purpose: Answer auth requests immediately and push review outcomes.
// Dependencies: axum (ws), futures, diting-core, uuid
// ============================================================================

//! ## Overview
//! Clients hold one WebSocket and multiplex requests by `request_id`. `init`
//! and `ping` answer `pong`; `auth` runs the non-blocking evaluation and
//! replies `immediate`. When the decision is `review`, a background poller
//! watches CHEQ until a terminal status (or the deadline), records the
//! terminal evidence through the pipeline, and pushes `approval_push` on the
//! same connection. All writes go through one writer task so pollers and the
//! request loop never interleave frames.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::WebSocketUpgrade;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::response::Response;
use diting_core::AuthDecision;
use diting_core::AuthOutcome;
use diting_core::ConfirmationStatus;
use diting_core::RequestContext;
use diting_core::ReviewHandle;
use futures::SinkExt;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::exec::ExecAuthRequest;
use crate::exec::build_exec_context;
use crate::state::GatewayState;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Handshake payload of an `init` message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthStreamInit {
    /// Client identifier.
    #[serde(default)]
    pub client_id: String,
    /// Resource the client guards.
    #[serde(default)]
    pub resource: String,
    /// Client agent version.
    #[serde(default)]
    pub agent_version: String,
}

/// Inbound auth-stream envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthStreamRequest {
    /// Correlation id echoed on replies.
    #[serde(default)]
    pub request_id: String,
    /// Handshake payload.
    #[serde(default)]
    pub init: Option<AuthStreamInit>,
    /// Authorization request payload.
    #[serde(default)]
    pub auth: Option<ExecAuthRequest>,
    /// Keepalive payload.
    #[serde(default)]
    pub ping: String,
}

/// Asynchronous review outcome push.
#[derive(Debug, Clone, Serialize)]
pub struct AuthStreamApprovalPush {
    /// Confirmation object id the outcome belongs to.
    pub cheq_id: String,
    /// Final decision, `allow` or `deny`.
    pub final_decision: String,
    /// Human-readable reason.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub reason: String,
}

/// Outbound auth-stream envelope.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AuthStreamResponse {
    /// Correlation id of the request being answered.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub request_id: String,
    /// Immediate evaluation result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub immediate: Option<AuthDecision>,
    /// Asynchronous review outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_push: Option<AuthStreamApprovalPush>,
    /// Keepalive reply.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pong: String,
    /// Error note for malformed frames.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl AuthStreamResponse {
    /// Builds a pong reply.
    #[must_use]
    fn pong(request_id: String) -> Self {
        Self {
            request_id,
            pong: "pong".to_string(),
            ..Self::default()
        }
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `GET /auth/stream` upgrade handler.
pub(crate) async fn auth_stream(
    State(state): State<Arc<GatewayState>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| handle_socket(state, socket))
}

/// Runs one auth-stream connection to completion.
async fn handle_socket(state: Arc<GatewayState>, socket: WebSocket) {
    let (mut sink, mut inbound) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<AuthStreamResponse>();

    // Single writer: pollers and the request loop both enqueue here.
    let writer = tokio::spawn(async move {
        while let Some(response) = outbound_rx.recv().await {
            let Ok(frame) = serde_json::to_string(&response) else {
                continue;
            };
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = inbound.next().await {
        let Ok(message) = message else {
            break;
        };
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };
        let Ok(mut request) = serde_json::from_str::<AuthStreamRequest>(&text) else {
            let _ = outbound.send(AuthStreamResponse {
                error: "invalid json".to_string(),
                ..AuthStreamResponse::default()
            });
            continue;
        };
        if request.request_id.is_empty() {
            request.request_id = Uuid::new_v4().to_string();
        }
        if request.init.is_some() || !request.ping.is_empty() {
            let _ = outbound.send(AuthStreamResponse::pong(request.request_id));
            continue;
        }
        let Some(auth) = request.auth.take() else {
            continue;
        };
        handle_auth(&state, &outbound, request.request_id, auth).await;
    }
    drop(outbound);
    let _ = writer.await;
}

/// Evaluates one `auth` frame and schedules the review poller when needed.
async fn handle_auth(
    state: &Arc<GatewayState>,
    outbound: &mpsc::UnboundedSender<AuthStreamResponse>,
    request_id: String,
    auth: ExecAuthRequest,
) {
    let trace_id =
        if auth.trace_id.is_empty() { Uuid::new_v4().to_string() } else { auth.trace_id.clone() };
    let ctx = build_exec_context(&auth, &auth.subject);

    let (decision, handle) = match state.pipeline.evaluate_non_blocking(&trace_id, &ctx).await {
        Ok(result) => result,
        Err(err) => {
            tracing::error!(trace_id, error = %err, "auth-stream evaluation failed");
            let _ = outbound.send(AuthStreamResponse {
                request_id,
                immediate: Some(AuthDecision {
                    decision: AuthOutcome::Deny,
                    policy_rule_id: String::new(),
                    reason: "evaluate failed".to_string(),
                    cheq_id: None,
                    approval_timeout_sec: None,
                }),
                ..AuthStreamResponse::default()
            });
            return;
        }
    };
    let is_review = decision.decision == AuthOutcome::Review;
    let _ = outbound.send(AuthStreamResponse {
        request_id: request_id.clone(),
        immediate: Some(decision),
        ..AuthStreamResponse::default()
    });
    if is_review && let Some(handle) = handle {
        let state = Arc::clone(state);
        let outbound = outbound.clone();
        tokio::spawn(async move {
            wait_and_push(state, outbound, request_id, trace_id, ctx, handle).await;
        });
    }
}

/// Polls CHEQ until terminal (or the deadline), records evidence, pushes.
async fn wait_and_push(
    state: Arc<GatewayState>,
    outbound: mpsc::UnboundedSender<AuthStreamResponse>,
    request_id: String,
    trace_id: String,
    ctx: RequestContext,
    handle: ReviewHandle,
) {
    let timeout_secs = if handle.timeout_secs == 0 { 300 } else { handle.timeout_secs };
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    let mut final_status: Option<ConfirmationStatus> = None;
    let mut confirmer_ids: Vec<String> = Vec::new();

    while tokio::time::Instant::now() < deadline {
        match state.pipeline.get_cheq_by_id(&handle.cheq_id).await {
            Ok(Some(object)) if object.is_terminal() => {
                final_status = Some(object.status);
                confirmer_ids = object.confirmer_ids;
                break;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(cheq_id = %handle.cheq_id, error = %err, "stream poll failed; retrying");
            }
        }
        tokio::time::sleep(state.stream_poll_interval).await;
    }
    let status = final_status.unwrap_or(ConfirmationStatus::Expired);
    state.pipeline.record_cheq_decision(
        &trace_id,
        &ctx,
        &handle.policy_rule_id,
        &handle.decision_reason,
        &handle.cheq_id,
        status,
        &confirmer_ids,
    );
    let final_decision =
        if status == ConfirmationStatus::Approved { "allow" } else { "deny" };
    let _ = outbound.send(AuthStreamResponse {
        request_id,
        approval_push: Some(AuthStreamApprovalPush {
            cheq_id: handle.cheq_id,
            final_decision: final_decision.to_string(),
            reason: format!("confirmation {}", status.as_str()),
        }),
        ..AuthStreamResponse::default()
    });
}
