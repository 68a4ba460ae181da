// crates/diting-ledger/src/ledger.rs
// ============================================================================
// Module: Ledger Interface
// Description: DID and audit-batch operations over a pluggable backend.
// Purpose: Stamp documents, order batch leaves, and expose proof retrieval.
// Dependencies: crate::backend, crate::types, async-trait, time
// ============================================================================

//! ## Overview
//! [`Ledger`] is the async seam the gateway and the audit bridge depend on;
//! [`LedgerImpl`] implements it over a [`LedgerBackend`]. Batch leaves are
//! committed in stable (sorted-by-trace-id) order so identical inputs always
//! produce identical roots.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::backend::LedgerBackend;
use crate::compact_utc_stamp;
use crate::types::DidDocument;
use crate::types::LedgerError;
use crate::types::MerkleProof;
use crate::types::TraceLeaf;

// ============================================================================
// SECTION: Ledger Interface
// ============================================================================

/// Ledger operations for DID documents and audit commitment.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Stamps and persists a DID document, returning `<id>@<yyyymmddHHMMSS>`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the document is invalid or the write
    /// fails.
    async fn put_did(&self, doc: DidDocument) -> Result<String, LedgerError>;

    /// Loads a DID document.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when absent.
    async fn get_did(&self, did: &str) -> Result<DidDocument, LedgerError>;

    /// Commits `trace_id → hash` pairs as one Merkle batch; returns the root.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EmptyBatch`] for empty input and
    /// [`LedgerError::Backend`] on storage failure.
    async fn append_batch(
        &self,
        batch_id: &str,
        trace_hashes: &BTreeMap<String, String>,
    ) -> Result<String, LedgerError>;

    /// Returns the stored verification proof for a trace id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when the trace was never committed.
    async fn merkle_proof(&self, trace_id: &str) -> Result<MerkleProof, LedgerError>;

    /// Reports backend health for the chain health endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the backend is unavailable.
    async fn healthy(&self) -> Result<(), LedgerError>;
}

// ============================================================================
// SECTION: Implementation
// ============================================================================

/// Ledger over a pluggable backend.
pub struct LedgerImpl {
    /// Storage backend.
    backend: Arc<dyn LedgerBackend>,
}

impl LedgerImpl {
    /// Creates a ledger over the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self {
            backend,
        }
    }
}

#[async_trait]
impl Ledger for LedgerImpl {
    async fn put_did(&self, mut doc: DidDocument) -> Result<String, LedgerError> {
        let now = OffsetDateTime::now_utc();
        if doc.created_at.is_none() {
            doc.created_at = Some(now);
        }
        doc.updated_at = Some(now);
        self.backend.put_did(&doc)?;
        Ok(format!("{}@{}", doc.id, compact_utc_stamp(now)))
    }

    async fn get_did(&self, did: &str) -> Result<DidDocument, LedgerError> {
        self.backend.get_did(did)
    }

    async fn append_batch(
        &self,
        batch_id: &str,
        trace_hashes: &BTreeMap<String, String>,
    ) -> Result<String, LedgerError> {
        // BTreeMap iteration gives the stable leaf order the proofs rely on.
        let leaves: Vec<TraceLeaf> = trace_hashes
            .iter()
            .map(|(trace_id, hash)| TraceLeaf {
                trace_id: trace_id.clone(),
                hash: hash.clone(),
            })
            .collect();
        self.backend.append_batch(batch_id, &leaves)
    }

    async fn merkle_proof(&self, trace_id: &str) -> Result<MerkleProof, LedgerError> {
        self.backend.merkle_proof(trace_id)
    }

    async fn healthy(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}
