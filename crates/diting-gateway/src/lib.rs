// crates/diting-gateway/src/lib.rs
// ============================================================================
// Module: Diting Gateway
// Description: Request surfaces sharing the decision pipeline.
// Purpose: Expose the reverse proxy, exec endpoint, auth stream, follow-up
//          endpoints, and the chain API over one router.
// Dependencies: axum, diting-core, diting-ledger, reqwest
// ============================================================================

//! ## Overview
//! The gateway is a thin shell around [`diting_core::DecisionPipeline`]:
//! every surface builds a [`diting_core::RequestContext`], runs the shared
//! evaluation, and differs only in how it waits for and delivers the
//! decision. The catch-all route reverse-proxies allowed traffic upstream;
//! `/auth/exec` answers synchronously; `/auth/stream` answers immediately and
//! pushes review outcomes; `/chain/*` exposes the ledger when enabled.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod chain;
mod exec;
mod follow_up;
mod proxy;
mod sandbox;
mod server;
mod state;
mod stream;


pub use exec::ExecAuthRequest;
pub use exec::build_exec_context;
pub use sandbox::SandboxProfile;
pub use server::build_router;
pub use server::serve;
pub use state::GatewayState;
pub use stream::AuthStreamRequest;
pub use stream::AuthStreamResponse;
