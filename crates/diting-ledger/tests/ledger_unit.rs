// crates/diting-ledger/tests/ledger_unit.rs
// ============================================================================
// Module: Ledger Unit Tests
// Description: Unit tests for DID storage, batch commitment, and proofs.
// Purpose: Validate backend round-trips in memory and on disk.
// Dependencies: diting-ledger
// ============================================================================

//! ## Overview
//! Exercises the local backend in both modes: DID stamping and versioned
//! put results, batch commitment with verifiable proofs, sanitized file
//! names, and not-found behavior.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use diting_ledger::DidDocument;
use diting_ledger::DidStatus;
use diting_ledger::Ledger;
use diting_ledger::LedgerError;
use diting_ledger::LedgerImpl;
use diting_ledger::LocalBackend;
use diting_ledger::verify_proof;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn document(id: &str) -> DidDocument {
    DidDocument {
        id: id.to_string(),
        public_key: "-----BEGIN PUBLIC KEY-----".to_string(),
        environment_fingerprint: "fp-1".to_string(),
        owner: String::new(),
        status: DidStatus::Active,
        created_at: None,
        updated_at: None,
    }
}

fn hashes(count: usize) -> BTreeMap<String, String> {
    (0..count).map(|i| (format!("trace-{i}"), format!("{i:064x}"))).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn put_did_stamps_and_returns_versioned_id() {
    let ledger = LedgerImpl::new(Arc::new(LocalBackend::in_memory()));
    let version = ledger.put_did(document("did:diting:dev:abc")).await.unwrap();
    assert!(version.starts_with("did:diting:dev:abc@"));
    assert_eq!(version.len(), "did:diting:dev:abc@".len() + 14);

    let stored = ledger.get_did("did:diting:dev:abc").await.unwrap();
    assert!(stored.created_at.is_some());
    assert!(stored.updated_at.is_some());
}

#[tokio::test]
async fn get_did_absent_is_not_found() {
    let ledger = LedgerImpl::new(Arc::new(LocalBackend::in_memory()));
    let err = ledger.get_did("did:diting:dev:missing").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));
}

#[tokio::test]
async fn append_batch_produces_verifiable_proofs() {
    let ledger = LedgerImpl::new(Arc::new(LocalBackend::in_memory()));
    let batch = hashes(5);
    let root = ledger.append_batch("audit-20260101000000", &batch).await.unwrap();
    assert!(!root.is_empty());

    for trace_id in batch.keys() {
        let proof = ledger.merkle_proof(trace_id).await.unwrap();
        assert_eq!(proof.merkle_root, root);
        assert_eq!(proof.batch_id, "audit-20260101000000");
        assert!(verify_proof(&proof), "proof for {trace_id}");
    }
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let ledger = LedgerImpl::new(Arc::new(LocalBackend::in_memory()));
    let err = ledger.append_batch("audit-x", &BTreeMap::new()).await.unwrap_err();
    assert!(matches!(err, LedgerError::EmptyBatch));
}

#[tokio::test]
async fn proof_for_uncommitted_trace_is_not_found() {
    let ledger = LedgerImpl::new(Arc::new(LocalBackend::in_memory()));
    let err = ledger.merkle_proof("trace-unknown").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotFound));
}

#[tokio::test]
async fn directory_mode_persists_dids_batches_and_proofs() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = LedgerImpl::new(Arc::new(LocalBackend::with_path(dir.path()).unwrap()));

    ledger.put_did(document("did:diting:dev:xyz")).await.unwrap();
    // Colons in the id are sanitized into the file name.
    assert!(dir.path().join("dids").join("did_diting_dev_xyz.json").is_file());

    let root = ledger.append_batch("audit-20260101000001", &hashes(3)).await.unwrap();
    assert!(dir.path().join("batches").join("audit-20260101000001.json").is_file());
    let proof = ledger.merkle_proof("trace-1").await.unwrap();
    assert_eq!(proof.merkle_root, root);
    assert!(verify_proof(&proof));
    assert!(dir.path().join("proofs").join("trace-1.json").is_file());

    // A fresh backend over the same directory reads the persisted records.
    let reopened = LedgerImpl::new(Arc::new(LocalBackend::with_path(dir.path()).unwrap()));
    assert_eq!(reopened.get_did("did:diting:dev:xyz").await.unwrap().id, "did:diting:dev:xyz");
    assert!(verify_proof(&reopened.merkle_proof("trace-2").await.unwrap()));
}
