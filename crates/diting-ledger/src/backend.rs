// crates/diting-ledger/src/backend.rs
// ============================================================================
// Module: Ledger Backend
// Description: Pluggable storage behind the ledger, with a local default.
// Purpose: Persist DID documents, batch records, and verification proofs.
// Dependencies: serde_json, crate::merkle, crate::types
// ============================================================================

//! ## Overview
//! [`LocalBackend`] keeps everything in memory and, when a base path is
//! configured, mirrors records into `dids/`, `batches/`, and `proofs/`
//! directories with sanitized file names. Memory-only mode is for tests and
//! gateways that want attestation semantics without durable chain state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use time::OffsetDateTime;

use crate::merkle::build_merkle_tree;
use crate::types::BatchRecord;
use crate::types::DidDocument;
use crate::types::LedgerError;
use crate::types::MerkleProof;
use crate::types::TraceLeaf;

// ============================================================================
// SECTION: Backend Interface
// ============================================================================

/// Pluggable storage backend behind [`crate::Ledger`].
pub trait LedgerBackend: Send + Sync {
    /// Persists a DID document, replacing any record under the same id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the write fails.
    fn put_did(&self, doc: &DidDocument) -> Result<(), LedgerError>;

    /// Loads a DID document by id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when absent.
    fn get_did(&self, did: &str) -> Result<DidDocument, LedgerError>;

    /// Commits a batch: builds the Merkle tree, persists the batch record and
    /// one proof per leaf, and returns the root.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EmptyBatch`] for empty batches and
    /// [`LedgerError::Backend`] on storage failure.
    fn append_batch(&self, batch_id: &str, leaves: &[TraceLeaf]) -> Result<String, LedgerError>;

    /// Loads the stored proof for a trace id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotFound`] when the trace was never committed.
    fn merkle_proof(&self, trace_id: &str) -> Result<MerkleProof, LedgerError>;
}

// ============================================================================
// SECTION: Local Backend
// ============================================================================

/// Mutable state of the local backend.
#[derive(Debug, Default)]
struct LocalState {
    /// DID documents by id.
    dids: BTreeMap<String, DidDocument>,
    /// Proofs by trace id (memory-only mode).
    proofs: BTreeMap<String, MerkleProof>,
}

/// In-memory backend with optional directory persistence.
///
/// # Invariants
/// - With a base path, files are the durable record; memory is a cache.
/// - File names sanitize `:`, `/`, and `\` to `_`.
pub struct LocalBackend {
    /// Guarded mutable state.
    state: Mutex<LocalState>,
    /// Persistence root; `None` is memory-only mode.
    base_path: Option<PathBuf>,
}

impl LocalBackend {
    /// Creates a memory-only backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LocalState::default()),
            base_path: None,
        }
    }

    /// Creates a backend persisting under `base_path`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Backend`] when the subdirectories cannot be
    /// created.
    pub fn with_path(base_path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let base_path = base_path.into();
        for sub in ["dids", "batches", "proofs"] {
            fs::create_dir_all(base_path.join(sub))
                .map_err(|err| LedgerError::Backend(format!("chain dir create: {err}")))?;
        }
        Ok(Self {
            state: Mutex::new(LocalState::default()),
            base_path: Some(base_path),
        })
    }

    /// Locks the state, mapping poisoning onto a backend error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LocalState>, LedgerError> {
        self.state.lock().map_err(|_| LedgerError::Backend("ledger lock poisoned".to_string()))
    }

    /// Path of a DID document file.
    fn did_path(&self, base: &PathBuf, did: &str) -> PathBuf {
        base.join("dids").join(format!("{}.json", sanitize(did)))
    }

    /// Path of a batch record file.
    fn batch_path(&self, base: &PathBuf, batch_id: &str) -> PathBuf {
        base.join("batches").join(format!("{}.json", sanitize(batch_id)))
    }

    /// Path of a proof file.
    fn proof_path(&self, base: &PathBuf, trace_id: &str) -> PathBuf {
        base.join("proofs").join(format!("{}.json", sanitize(trace_id)))
    }
}

/// Replaces path-hostile characters in identifiers used as file names.
fn sanitize(id: &str) -> String {
    id.replace([':', '/', '\\'], "_")
}

/// Serializes a record to pretty JSON for on-disk inspection.
fn encode<T: serde::Serialize>(record: &T) -> Result<Vec<u8>, LedgerError> {
    serde_json::to_vec_pretty(record)
        .map_err(|err| LedgerError::Backend(format!("chain encode: {err}")))
}

impl LedgerBackend for LocalBackend {
    fn put_did(&self, doc: &DidDocument) -> Result<(), LedgerError> {
        if doc.id.is_empty() {
            return Err(LedgerError::Invalid("did id must not be empty".to_string()));
        }
        let mut state = self.lock()?;
        state.dids.insert(doc.id.clone(), doc.clone());
        if let Some(base) = &self.base_path {
            fs::write(self.did_path(base, &doc.id), encode(doc)?)
                .map_err(|err| LedgerError::Backend(format!("did write: {err}")))?;
        }
        Ok(())
    }

    fn get_did(&self, did: &str) -> Result<DidDocument, LedgerError> {
        {
            let state = self.lock()?;
            if let Some(doc) = state.dids.get(did) {
                return Ok(doc.clone());
            }
        }
        if let Some(base) = &self.base_path {
            let data = match fs::read(self.did_path(base, did)) {
                Ok(data) => data,
                Err(err) if err.kind() == ErrorKind::NotFound => return Err(LedgerError::NotFound),
                Err(err) => return Err(LedgerError::Backend(format!("did read: {err}"))),
            };
            let doc: DidDocument = serde_json::from_slice(&data)
                .map_err(|err| LedgerError::Backend(format!("did decode: {err}")))?;
            let mut state = self.lock()?;
            state.dids.insert(doc.id.clone(), doc.clone());
            return Ok(doc);
        }
        Err(LedgerError::NotFound)
    }

    fn append_batch(&self, batch_id: &str, leaves: &[TraceLeaf]) -> Result<String, LedgerError> {
        if leaves.is_empty() {
            return Err(LedgerError::EmptyBatch);
        }
        let (root, paths) = build_merkle_tree(leaves);
        let batch = BatchRecord {
            batch_id: batch_id.to_string(),
            merkle_root: root.clone(),
            timestamp: OffsetDateTime::now_utc(),
        };
        let mut state = self.lock()?;
        if let Some(base) = &self.base_path {
            fs::write(self.batch_path(base, batch_id), encode(&batch)?)
                .map_err(|err| LedgerError::Backend(format!("batch write: {err}")))?;
        }
        for (leaf, path) in leaves.iter().zip(&paths) {
            let proof = MerkleProof {
                trace_id: leaf.trace_id.clone(),
                batch_id: batch_id.to_string(),
                merkle_root: root.clone(),
                leaf_hash: path.leaf_hash.clone(),
                leaf_index: path.leaf_index,
                siblings: path.siblings.clone(),
            };
            if let Some(base) = &self.base_path {
                fs::write(self.proof_path(base, &leaf.trace_id), encode(&proof)?)
                    .map_err(|err| LedgerError::Backend(format!("proof write: {err}")))?;
            } else {
                state.proofs.insert(leaf.trace_id.clone(), proof);
            }
        }
        Ok(root)
    }

    fn merkle_proof(&self, trace_id: &str) -> Result<MerkleProof, LedgerError> {
        if let Some(base) = &self.base_path {
            let data = match fs::read(self.proof_path(base, trace_id)) {
                Ok(data) => data,
                Err(err) if err.kind() == ErrorKind::NotFound => return Err(LedgerError::NotFound),
                Err(err) => return Err(LedgerError::Backend(format!("proof read: {err}"))),
            };
            return serde_json::from_slice(&data)
                .map_err(|err| LedgerError::Backend(format!("proof decode: {err}")));
        }
        let state = self.lock()?;
        state.proofs.get(trace_id).cloned().ok_or(LedgerError::NotFound)
    }
}
