// crates/diting-ledger/src/types.rs
// ============================================================================
// Module: Ledger Types
// Description: DID documents, batch records, Merkle proofs, and errors.
// Purpose: Define the ledger's persisted entities with stable wire forms.
// Dependencies: serde, time, thiserror
// ============================================================================

//! ## Overview
//! Ledger entities serialize with the wire field names the chain API exposes
//! (`publicKey`, `environmentFingerprint`, snake_case elsewhere). Documents
//! are opaque to the decision pipeline; only the chain surface reads them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ledger errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No record under the requested key.
    #[error("ledger: not found")]
    NotFound,
    /// A batch must carry at least one trace hash.
    #[error("ledger: empty batch")]
    EmptyBatch,
    /// Invalid caller input.
    #[error("ledger: invalid input: {0}")]
    Invalid(String),
    /// Backend storage failure.
    #[error("ledger backend error: {0}")]
    Backend(String),
}

// ============================================================================
// SECTION: DID Documents
// ============================================================================

/// DID document status.
///
/// # Invariants
/// - Values are stable wire labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DidStatus {
    /// Document is active.
    Active,
    /// Document has been revoked.
    Revoked,
    /// Document is awaiting activation.
    Pending,
}

/// Opaque DID document stored by the ledger.
///
/// # Invariants
/// - `id` is the storage key; contents are not interpreted.
/// - Timestamps are stamped by the ledger on write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    /// DID, e.g. `did:diting:<chain>:<hash>`.
    pub id: String,
    /// Public key material (PEM, JWK, or similar).
    #[serde(rename = "publicKey")]
    pub public_key: String,
    /// Deployment environment fingerprint hash.
    #[serde(rename = "environmentFingerprint", default)]
    pub environment_fingerprint: String,
    /// Owner DID or identifier.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,
    /// Document status.
    pub status: DidStatus,
    /// Creation instant, stamped on first write.
    #[serde(rename = "createdAt", default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    /// Last update instant, stamped on every write.
    #[serde(rename = "updatedAt", default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Audit Batches & Proofs
// ============================================================================

/// Metadata of one committed audit batch.
///
/// # Invariants
/// - `merkle_root` covers every leaf committed under `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRecord {
    /// Batch identifier (`audit-<yyyymmddHHMMSS>` for bridge batches).
    pub batch_id: String,
    /// Hex-encoded Merkle root over the batch leaves.
    pub merkle_root: String,
    /// Commitment instant.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// One leaf of an audit batch: a trace id and its evidence hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLeaf {
    /// Trace identifier.
    pub trace_id: String,
    /// Hex-encoded SHA-256 of the serialized evidence record.
    pub hash: String,
}

/// Verification proof for one committed trace.
///
/// # Invariants
/// - `siblings[i]` is the sibling at layer `i`, ordered leaf → root; layers
///   where the node was paired with itself carry the node's own hash.
/// - `leaf_index` positions the leaf so a verifier can pick the fold side at
///   every layer (even index folds left-first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Trace identifier the proof covers.
    pub trace_id: String,
    /// Batch the trace was committed under.
    pub batch_id: String,
    /// Hex-encoded batch root.
    pub merkle_root: String,
    /// Hex-encoded leaf hash.
    pub leaf_hash: String,
    /// Leaf position within the batch's stable leaf order.
    #[serde(default)]
    pub leaf_index: usize,
    /// Sibling hashes from leaf toward root.
    pub siblings: Vec<String>,
}
