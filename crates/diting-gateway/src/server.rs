// crates/diting-gateway/src/server.rs
// ============================================================================
// Module: Gateway Server
// Description: Router assembly and graceful serving.
// Purpose: Mount every surface over one shared state and serve it.
// Dependencies: axum, tokio, crate handlers
// ============================================================================

//! ## Overview
//! Explicit routes come first (probes, follow-up, auth surfaces, chain API);
//! everything else falls through to the reverse proxy. [`serve`] binds a
//! listener and drains gracefully when the shutdown future resolves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use axum::routing::post;

use crate::chain;
use crate::exec;
use crate::follow_up;
use crate::proxy;
use crate::sandbox;
use crate::state::GatewayState;
use crate::stream;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the gateway router over shared state.
///
/// Chain routes are mounted whenever state carries a ledger; they answer 503
/// otherwise, so the route table is identical across deployments.
#[must_use]
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/healthz", get(follow_up::healthz))
        .route("/readyz", get(follow_up::readyz))
        .route("/debug/audit", get(follow_up::debug_audit))
        .route("/cheq/approve", get(follow_up::cheq_approve).post(follow_up::cheq_approve))
        .route("/feishu/card", post(follow_up::feishu_card))
        .route("/auth/exec", post(exec::exec_auth))
        .route(
            "/auth/sandbox-profile",
            get(sandbox::sandbox_profile).post(sandbox::sandbox_profile),
        )
        .route("/auth/stream", get(stream::auth_stream))
        .route("/init_permission", post(follow_up::init_permission))
        .route("/chain/did/register", post(chain::did_register))
        .route("/chain/did/{did}", get(chain::did_get))
        .route("/chain/audit/batch", post(chain::audit_batch))
        .route("/chain/audit/verify", get(chain::audit_verify))
        .route("/chain/health", get(chain::chain_health))
        .fallback(proxy::proxy_handler)
        .with_state(state)
}

// ============================================================================
// SECTION: Serve
// ============================================================================

/// Serves the gateway until the shutdown future resolves.
///
/// # Errors
///
/// Returns the bind or serve error from the underlying listener.
pub async fn serve(
    state: Arc<GatewayState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "gateway listening");
    axum::serve(listener, router).with_graceful_shutdown(shutdown).await
}
