// crates/diting-core/src/core/context.rs
// ============================================================================
// Module: Request Context
// Description: Evaluation input assembled by a request surface.
// Purpose: Carry agent identity, target, and extension data through the
//          decision pipeline without surface-specific detail.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`RequestContext`] is built once by the receiving surface (proxy, exec
//! endpoint, or auth stream) and is immutable afterwards. The pipeline, the
//! policy engine, and the audit path all read from the same snapshot, so a
//! single request is always evaluated against one consistent view.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Extension map key carrying the optional risk classification signal.
pub const EXT_RISK_LEVEL: &str = "risk_level";
/// Extension map key carrying the command line for exec-layer requests.
pub const EXT_COMMAND_LINE: &str = "command_line";
/// Extension map key carrying the working directory for exec-layer requests.
pub const EXT_WORKING_DIR: &str = "working_dir";

/// Evaluation input for one intercepted action.
///
/// # Invariants
/// - Immutable after construction by the surface; engines never mutate it.
/// - `agent_identity` is an opaque bearer token and may be empty when the
///   caller supplied no identity.
/// - `headers` and `extensions` are snapshots; values are untrusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Opaque agent identity (L0 bearer token), possibly empty.
    #[serde(default)]
    pub agent_identity: String,
    /// Request method (`GET`, `POST`, `EXEC`, ...).
    #[serde(default)]
    pub method: String,
    /// Target URL, or the command line for exec-layer requests.
    #[serde(default)]
    pub target_url: String,
    /// Resource identifier used for policy evaluation and approval matching.
    #[serde(default)]
    pub resource: String,
    /// Action verb used for policy evaluation.
    #[serde(default)]
    pub action: String,
    /// Header snapshot (`traceparent`, `X-Agent-Token`, ...).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional extension values (`risk_level`, `command_line`, ...).
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

impl RequestContext {
    /// Returns the risk level extension, or an empty string when absent.
    #[must_use]
    pub fn risk_level(&self) -> &str {
        self.extensions.get(EXT_RISK_LEVEL).map_or("", String::as_str)
    }

    /// Returns the resource, falling back to the target URL.
    ///
    /// Approval matching and CHEQ creation use this form so that requests
    /// without an explicit resource still route to the right approvers.
    #[must_use]
    pub fn resource_or_target(&self) -> &str {
        if self.resource.is_empty() { &self.target_url } else { &self.resource }
    }
}
