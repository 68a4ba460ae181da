// crates/diting-ledger/src/lib.rs
// ============================================================================
// Module: Diting Ledger
// Description: DID document CRUD, Merkle-batched audit commitment, proofs.
// Purpose: Provide the append-only attestation layer behind the audit trail.
// Dependencies: diting-core, sha2, hex, serde_json, tokio
// ============================================================================

//! ## Overview
//! The ledger stores opaque DID documents and commits audit evidence hashes
//! in Merkle batches: each batch builds a SHA-256 tree over its trace hashes,
//! persists the root, and stores one verification proof per trace. The
//! [`AuditLedgerBridge`] wraps an evidence store and feeds the ledger
//! asynchronously, so audit durability never depends on ledger availability.
//!
//! Non-goals: cross-gateway replication, Byzantine fault tolerance, and the
//! DID certificate lifecycle (documents are opaque records).

// ============================================================================
// SECTION: Modules
// ============================================================================

mod backend;
mod bridge;
mod ledger;
mod merkle;
mod types;

pub use backend::LedgerBackend;
pub use backend::LocalBackend;
pub use bridge::AuditLedgerBridge;
pub use bridge::BridgeConfig;
pub use ledger::Ledger;
pub use ledger::LedgerImpl;
pub use merkle::MerkleProofPath;
pub use merkle::build_merkle_tree;
pub use merkle::hash_pair;
pub use merkle::verify_proof;
pub use types::BatchRecord;
pub use types::DidDocument;
pub use types::DidStatus;
pub use types::LedgerError;
pub use types::MerkleProof;
pub use types::TraceLeaf;

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Compact UTC stamp (`yyyymmddHHMMSS`) used in batch ids and DID versions.
#[must_use]
pub(crate) fn compact_utc_stamp(at: time::OffsetDateTime) -> String {
    let format = time::macros::format_description!(
        "[year][month][day][hour][minute][second]"
    );
    at.format(&format).unwrap_or_else(|_| at.unix_timestamp().to_string())
}
