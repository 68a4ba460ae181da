// crates/diting-ledger/tests/bridge_unit.rs
// ============================================================================
// Module: Audit Bridge Unit Tests
// Description: Unit tests for batched hash commitment behind the audit store.
// Purpose: Validate size-triggered flushes, shutdown flushes, and hashing.
// Dependencies: diting-ledger, diting-core
// ============================================================================

//! ## Overview
//! Exercises the bridge with an in-memory evidence store and a recording
//! ledger: appends reach the inner store first, hashes batch up by size, the
//! final flush happens on shutdown, and failed batches are dropped without
//! touching the evidence log.

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
use std::time::Duration;

use async_trait::async_trait;
use diting_core::Evidence;
use diting_core::EvidenceDecision;
use diting_core::EvidenceStore;
use diting_core::InMemoryEvidenceStore;
use diting_ledger::AuditLedgerBridge;
use diting_ledger::BridgeConfig;
use diting_ledger::DidDocument;
use diting_ledger::Ledger;
use diting_ledger::LedgerError;
use diting_ledger::MerkleProof;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Ledger double recording committed batches; can be switched to fail.
#[derive(Default)]
struct RecordingLedger {
    batches: std::sync::Mutex<Vec<(String, BTreeMap<String, String>)>>,
    fail: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl Ledger for RecordingLedger {
    async fn put_did(&self, _doc: DidDocument) -> Result<String, LedgerError> {
        Err(LedgerError::Backend("unused".to_string()))
    }

    async fn get_did(&self, _did: &str) -> Result<DidDocument, LedgerError> {
        Err(LedgerError::NotFound)
    }

    async fn append_batch(
        &self,
        batch_id: &str,
        trace_hashes: &BTreeMap<String, String>,
    ) -> Result<String, LedgerError> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(LedgerError::Backend("injected failure".to_string()));
        }
        self.batches
            .lock()
            .unwrap()
            .push((batch_id.to_string(), trace_hashes.clone()));
        Ok("root".to_string())
    }

    async fn merkle_proof(&self, _trace_id: &str) -> Result<MerkleProof, LedgerError> {
        Err(LedgerError::NotFound)
    }

    async fn healthy(&self) -> Result<(), LedgerError> {
        Ok(())
    }
}

fn evidence(trace_id: &str) -> Evidence {
    Evidence {
        trace_id: trace_id.to_string(),
        span_id: None,
        agent_id: "agent".to_string(),
        policy_rule_id: "r1".to_string(),
        decision_reason: "ok".to_string(),
        decision: EvidenceDecision::Allow,
        cheq_status: String::new(),
        confirmer: String::new(),
        timestamp: time::OffsetDateTime::now_utc(),
        resource: "/r".to_string(),
        action: "GET".to_string(),
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition not reached in time");
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn batch_size_triggers_flush() {
    let inner = Arc::new(InMemoryEvidenceStore::new());
    let ledger = Arc::new(RecordingLedger::default());
    let bridge = AuditLedgerBridge::new(
        Arc::clone(&inner) as Arc<dyn EvidenceStore>,
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        BridgeConfig {
            batch_size: 2,
            interval: Duration::from_secs(3600),
        },
    );

    bridge.append(&evidence("t1")).unwrap();
    bridge.append(&evidence("t2")).unwrap();
    wait_for(|| !ledger.batches.lock().unwrap().is_empty()).await;

    let batches = ledger.batches.lock().unwrap();
    assert_eq!(batches.len(), 1);
    let (batch_id, hashes) = &batches[0];
    assert!(batch_id.starts_with("audit-"));
    assert_eq!(hashes.len(), 2);
    let expected = hex::encode(Sha256::digest(serde_json::to_vec(&evidence("t1")).unwrap()));
    // Timestamps differ between construction sites, so compare shape only.
    assert_eq!(hashes.get("t1").map(String::len), Some(expected.len()));
    drop(batches);

    // The inner store saw both records regardless of ledger state.
    assert_eq!(inner.query_by_trace_id("t1").unwrap().len(), 1);
    assert_eq!(inner.query_by_trace_id("t2").unwrap().len(), 1);
    bridge.shutdown().await;
}

#[tokio::test]
async fn shutdown_flushes_pending_hashes() {
    let inner = Arc::new(InMemoryEvidenceStore::new());
    let ledger = Arc::new(RecordingLedger::default());
    let bridge = AuditLedgerBridge::new(
        Arc::clone(&inner) as Arc<dyn EvidenceStore>,
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        BridgeConfig {
            batch_size: 50,
            interval: Duration::from_secs(3600),
        },
    );
    bridge.append(&evidence("t1")).unwrap();
    bridge.shutdown().await;
    assert_eq!(ledger.batches.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn failed_batches_are_dropped_and_evidence_survives() {
    let inner = Arc::new(InMemoryEvidenceStore::new());
    let ledger = Arc::new(RecordingLedger::default());
    ledger.fail.store(true, std::sync::atomic::Ordering::SeqCst);
    let bridge = AuditLedgerBridge::new(
        Arc::clone(&inner) as Arc<dyn EvidenceStore>,
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        BridgeConfig {
            batch_size: 1,
            interval: Duration::from_secs(3600),
        },
    );
    bridge.append(&evidence("t1")).unwrap();
    bridge.shutdown().await;
    assert!(ledger.batches.lock().unwrap().is_empty());
    assert_eq!(inner.query_by_trace_id("t1").unwrap().len(), 1);
}

#[tokio::test]
async fn empty_trace_ids_are_not_committed() {
    let inner = Arc::new(InMemoryEvidenceStore::new());
    let ledger = Arc::new(RecordingLedger::default());
    let bridge = AuditLedgerBridge::new(
        Arc::clone(&inner) as Arc<dyn EvidenceStore>,
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        BridgeConfig {
            batch_size: 1,
            interval: Duration::from_secs(3600),
        },
    );
    bridge.append(&evidence("")).unwrap();
    bridge.shutdown().await;
    assert!(ledger.batches.lock().unwrap().is_empty());
}

#[tokio::test]
async fn queries_delegate_to_inner_store() {
    let inner = Arc::new(InMemoryEvidenceStore::new());
    let ledger = Arc::new(RecordingLedger::default());
    let bridge = AuditLedgerBridge::new(
        Arc::clone(&inner) as Arc<dyn EvidenceStore>,
        Arc::clone(&ledger) as Arc<dyn Ledger>,
        BridgeConfig::default(),
    );
    bridge.append(&evidence("t9")).unwrap();
    assert_eq!(bridge.query_by_trace_id("t9").unwrap().len(), 1);
    bridge.shutdown().await;
}
