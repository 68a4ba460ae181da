// crates/diting-gateway/src/proxy.rs
// ============================================================================
// Module: Reverse Proxy Surface
// Description: Catch-all handler gating upstream forwards on the pipeline.
// Purpose: Intercept agent HTTP traffic, evaluate, and proxy on approval.
// Dependencies: axum, reqwest, diting-core, uuid
// ============================================================================

//! ## Overview
//! Every request that matches no explicit route lands here: mint or adopt a
//! trace id, build the request context from the inbound request, run the
//! blocking evaluation, and forward upstream only on `allow` (or an approved
//! review). Denials answer 403 with the decision reason; identity-gate
//! rejections answer 401. `X-Trace-ID` is set on every response so the audit
//! trail can be queried afterwards.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::HeaderName;
use axum::http::HeaderValue;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::response::IntoResponse;
use axum::response::Response;
use diting_core::AuthOutcome;
use diting_core::RequestContext;
use uuid::Uuid;

use crate::state::GatewayState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Trace propagation headers.
const TRACEPARENT: &str = "traceparent";
/// Gateway-injected trace header.
const X_TRACE_ID: &str = "x-trace-id";
/// Rule id the pipeline uses for identity-gate rejections.
const L0_RULE_ID: &str = "l0";

/// Hop-by-hop headers never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

// ============================================================================
// SECTION: Context Construction
// ============================================================================

/// Extracts the trace id from inbound headers, minting one when absent.
#[must_use]
pub(crate) fn trace_id_from(headers: &HeaderMap) -> String {
    headers
        .get(TRACEPARENT)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string)
}

/// Builds the request context for one proxied request.
fn build_request_context(method: &Method, uri: &Uri, headers: &HeaderMap) -> RequestContext {
    let agent_identity = headers
        .get("x-agent-token")
        .or_else(|| headers.get("authorization"))
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let host =
        headers.get("host").and_then(|value| value.to_str().ok()).unwrap_or_default();
    let target_url =
        if host.is_empty() { uri.to_string() } else { format!("{host}{uri}") };
    let mut header_map = BTreeMap::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            header_map.insert(name.as_str().to_string(), value.to_string());
        }
    }
    RequestContext {
        agent_identity,
        method: method.to_string(),
        target_url,
        resource: uri.path().to_string(),
        action: method.to_string(),
        headers: header_map,
        extensions: BTreeMap::new(),
    }
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Catch-all proxy handler.
pub(crate) async fn proxy_handler(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = trace_id_from(&headers);
    let ctx = build_request_context(&method, &uri, &headers);

    let decision = match state.pipeline.evaluate_blocking(&trace_id, &ctx).await {
        Ok(decision) => decision,
        Err(err) => {
            tracing::error!(trace_id, error = %err, "proxy evaluation failed");
            return with_trace_header(
                StatusCode::INTERNAL_SERVER_ERROR.into_response(),
                &trace_id,
            );
        }
    };
    match decision.decision {
        AuthOutcome::Allow => {
            let response = forward_upstream(&state, &method, &uri, &headers, body, &trace_id).await;
            with_trace_header(response, &trace_id)
        }
        AuthOutcome::Deny => {
            let status = if decision.policy_rule_id == L0_RULE_ID {
                StatusCode::UNAUTHORIZED
            } else {
                StatusCode::FORBIDDEN
            };
            with_trace_header((status, decision.reason).into_response(), &trace_id)
        }
        // The blocking path resolves reviews itself; an unresolved review is
        // refused.
        AuthOutcome::Review => {
            with_trace_header((StatusCode::FORBIDDEN, decision.reason).into_response(), &trace_id)
        }
    }
}

/// Forwards the request upstream, preserving end-to-end headers.
async fn forward_upstream(
    state: &GatewayState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
    trace_id: &str,
) -> Response {
    let upstream = state.upstream.trim_end_matches('/');
    if upstream.is_empty() {
        return (StatusCode::BAD_GATEWAY, "no upstream configured").into_response();
    }
    let path_and_query = uri.path_and_query().map_or_else(|| uri.path(), |pq| pq.as_str());
    let target = format!("{upstream}{path_and_query}");

    let reqwest_method = match reqwest::Method::from_bytes(method.as_str().as_bytes()) {
        Ok(m) => m,
        Err(_) => return (StatusCode::BAD_GATEWAY, "unsupported method").into_response(),
    };
    let mut request = state.http.request(reqwest_method, &target);
    for (name, value) in headers {
        // Trace headers are re-injected below with the resolved trace id.
        if HOP_BY_HOP.contains(&name.as_str())
            || name.as_str() == TRACEPARENT
            || name.as_str() == X_TRACE_ID
        {
            continue;
        }
        if let Ok(value) = value.to_str() {
            request = request.header(name.as_str(), value);
        }
    }
    request = request.header(TRACEPARENT, trace_id).header(X_TRACE_ID, trace_id);
    let upstream_response = match request.body(body.to_vec()).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(trace_id, error = %err, "upstream request failed");
            return (StatusCode::BAD_GATEWAY, "upstream request failed").into_response();
        }
    };

    let status =
        StatusCode::from_u16(upstream_response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response_headers = HeaderMap::new();
    for (name, value) in upstream_response.headers() {
        if HOP_BY_HOP.contains(&name.as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_str().as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            response_headers.insert(name, value);
        }
    }
    let body = match upstream_response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(trace_id, error = %err, "upstream body read failed");
            return (StatusCode::BAD_GATEWAY, "upstream body read failed").into_response();
        }
    };
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

/// Sets `X-Trace-ID` on the outgoing response.
fn with_trace_header(mut response: Response, trace_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        response.headers_mut().insert(HeaderName::from_static(X_TRACE_ID), value);
    }
    response
}
