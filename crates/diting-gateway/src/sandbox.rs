// crates/diting-gateway/src/sandbox.rs
// ============================================================================
// Module: Sandbox Profile Surface
// Description: Minimal sandbox profile endpoint for node agents.
// Purpose: Hand agents their fail-closed execution boundary.
// Dependencies: axum, serde
// ============================================================================

//! ## Overview
//! `GET|POST /auth/sandbox-profile?resource=X` returns the minimal profile:
//! one default boundary and a fail-closed degradation policy. Hot-cache
//! entries stay empty in this build; agents treat an empty cache as "always
//! ask the gateway".

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Query;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Sandbox boundary limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxBoundary {
    /// Whether outbound network access is permitted inside the sandbox.
    pub network_enabled: bool,
    /// Writable filesystem paths.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fs_writable_paths: Vec<String>,
    /// Syscall filter preset name.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub syscall_preset: String,
}

/// Sandbox profile returned to node agents.
///
/// # Invariants
/// - `degradation_policy` is `FAIL_CLOSE`: on gateway unavailability the
///   agent refuses rather than runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxProfile {
    /// Profile identifier.
    pub profile_id: String,
    /// Profile version.
    pub version: String,
    /// Execution boundary.
    pub boundary: SandboxBoundary,
    /// Behavior when the gateway cannot be reached.
    pub degradation_policy: String,
}

/// Query string of the sandbox profile endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SandboxQuery {
    /// Resource the profile is requested for.
    #[serde(default)]
    resource: String,
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// `GET|POST /auth/sandbox-profile?resource=X`.
pub(crate) async fn sandbox_profile(Query(query): Query<SandboxQuery>) -> Json<SandboxProfile> {
    let resource =
        if query.resource.is_empty() { "local://default".to_string() } else { query.resource };
    tracing::debug!(resource = %resource, "sandbox profile requested");
    Json(SandboxProfile {
        profile_id: "default".to_string(),
        version: "1".to_string(),
        boundary: SandboxBoundary {
            network_enabled: true,
            fs_writable_paths: Vec::new(),
            syscall_preset: "default".to_string(),
        },
        degradation_policy: "FAIL_CLOSE".to_string(),
    })
}
