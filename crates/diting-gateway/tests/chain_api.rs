// crates/diting-gateway/tests/chain_api.rs
// ============================================================================
// Module: Chain API Scenarios
// Description: End-to-end tests for the /chain/* ledger surface.
// Purpose: Validate DID registration, batch commitment, and verification.
// Dependencies: diting-gateway, diting-ledger
// ============================================================================

//! ## Overview
//! Drives the chain surface over HTTP: DID registration and retrieval, batch
//! commitment returning a Merkle root, proof retrieval that re-folds to the
//! root, and the disabled-chain behavior.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions."
)]

mod common;

// ============================================================================
// SECTION: Imports
// ============================================================================

use diting_ledger::MerkleProof;
use diting_ledger::verify_proof;
use serde_json::Value;
use serde_json::json;

use common::FixtureOptions;
use common::TestGateway;

// ============================================================================
// SECTION: Tests
// ============================================================================

async fn chain_gateway() -> TestGateway {
    TestGateway::spawn(FixtureOptions {
        with_ledger: true,
        ..FixtureOptions::default()
    })
    .await
}

#[tokio::test]
async fn did_register_and_fetch_round_trip() {
    let gateway = chain_gateway().await;
    let register = gateway
        .client
        .post(gateway.url("/chain/did/register"))
        .json(&json!({
            "id": "did:diting:dev:abc",
            "publicKey": "-----BEGIN PUBLIC KEY-----",
            "environmentFingerprint": "fp-1"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(register.status(), 200);
    let body: Value = register.json().await.unwrap();
    let tx_id = body["tx_id"].as_str().unwrap();
    assert!(tx_id.starts_with("did:diting:dev:abc@"));

    let fetched: Value = gateway
        .client
        .get(gateway.url("/chain/did/did:diting:dev:abc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], "did:diting:dev:abc");
    assert_eq!(fetched["status"], "active");
    assert!(fetched["createdAt"].as_str().is_some());
}

#[tokio::test]
async fn did_register_requires_id_and_key() {
    let gateway = chain_gateway().await;
    let response = gateway
        .client
        .post(gateway.url("/chain/did/register"))
        .json(&json!({ "id": "did:diting:dev:x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn unknown_did_is_404() {
    let gateway = chain_gateway().await;
    let response =
        gateway.client.get(gateway.url("/chain/did/did:diting:dev:missing")).send().await.unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn audit_batch_commit_and_verify_round_trip() {
    let gateway = chain_gateway().await;
    let commit = gateway
        .client
        .post(gateway.url("/chain/audit/batch"))
        .json(&json!({
            "batch_id": "audit-20260101000000",
            "trace_id_hash": {
                "trace-a": "aa".repeat(32),
                "trace-b": "bb".repeat(32),
                "trace-c": "cc".repeat(32)
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(commit.status(), 200);
    let body: Value = commit.json().await.unwrap();
    let root = body["merkle_root"].as_str().unwrap().to_string();
    assert!(!root.is_empty());

    for trace in ["trace-a", "trace-b", "trace-c"] {
        let proof: MerkleProof = gateway
            .client
            .get(gateway.url(&format!("/chain/audit/verify?trace_id={trace}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(proof.merkle_root, root);
        assert_eq!(proof.batch_id, "audit-20260101000000");
        assert!(verify_proof(&proof), "proof for {trace}");
    }
}

#[tokio::test]
async fn empty_batch_is_rejected() {
    let gateway = chain_gateway().await;
    let response = gateway
        .client
        .post(gateway.url("/chain/audit/batch"))
        .json(&json!({ "batch_id": "audit-x", "trace_id_hash": {} }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn verify_for_unknown_trace_is_404() {
    let gateway = chain_gateway().await;
    let response = gateway
        .client
        .get(gateway.url("/chain/audit/verify?trace_id=never-committed"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn chain_health_reports_ok() {
    let gateway = chain_gateway().await;
    let body: Value = gateway
        .client
        .get(gateway.url("/chain/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn disabled_chain_answers_503() {
    let gateway = TestGateway::spawn(FixtureOptions::default()).await;
    let response = gateway.client.get(gateway.url("/chain/health")).send().await.unwrap();
    assert_eq!(response.status(), 503);
}
