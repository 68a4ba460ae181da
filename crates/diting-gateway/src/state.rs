// crates/diting-gateway/src/state.rs
// ============================================================================
// Module: Gateway State
// Description: Shared components handed to every surface handler.
// Purpose: Hold the pipeline, engines, upstream target, and HTTP client.
// Dependencies: diting-core, diting-ledger, reqwest
// ============================================================================

//! ## Overview
//! One [`GatewayState`] is built at wiring time and shared behind an `Arc`.
//! Handlers reach the pipeline for evaluation, the confirmation engine for
//! follow-up votes, the evidence store for debug queries, and (when enabled)
//! the ledger for the chain API.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use diting_core::ConfirmationEngine;
use diting_core::DecisionPipeline;
use diting_core::EvidenceStore;
use diting_ledger::Ledger;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state behind every gateway route.
///
/// # Invariants
/// - Components are wired once; handlers never replace them.
pub struct GatewayState {
    /// Shared decision pipeline.
    pub pipeline: Arc<DecisionPipeline>,
    /// Confirmation engine for follow-up votes and callbacks.
    pub cheq: Arc<dyn ConfirmationEngine>,
    /// Evidence store for debug queries.
    pub evidence: Arc<dyn EvidenceStore>,
    /// Ledger behind `/chain/*`; `None` leaves the chain API unmounted.
    pub ledger: Option<Arc<dyn Ledger>>,
    /// Upstream base URL for the reverse proxy.
    pub upstream: String,
    /// Outbound HTTP client shared by proxy forwards.
    pub http: reqwest::Client,
    /// Poll cadence of auth-stream review pollers.
    pub stream_poll_interval: Duration,
}

impl GatewayState {
    /// Creates gateway state around a wired pipeline.
    #[must_use]
    pub fn new(
        pipeline: Arc<DecisionPipeline>,
        ledger: Option<Arc<dyn Ledger>>,
        upstream: String,
    ) -> Self {
        let cheq = pipeline.confirmations();
        let evidence = pipeline.evidence_store();
        Self {
            pipeline,
            cheq,
            evidence,
            ledger,
            upstream,
            http: reqwest::Client::new(),
            stream_poll_interval: Duration::from_secs(2),
        }
    }

    /// Overrides the auth-stream poll cadence (tests use short intervals).
    #[must_use]
    pub fn with_stream_poll_interval(mut self, interval: Duration) -> Self {
        self.stream_poll_interval = interval;
        self
    }
}
