// crates/diting-gateway/src/chain.rs
// ============================================================================
// Module: Chain API Surface
// Description: HTTP surface over the ledger (DIDs, batches, proofs).
// Purpose: Expose DID registration and audit verification when enabled.
// Dependencies: axum, diting-ledger, serde
// ============================================================================

//! ## Overview
//! Mounted under `/chain` only when a ledger is wired: DID registration and
//! retrieval, direct batch commitment, Merkle proof retrieval for audit
//! verification, and a health probe. All handlers are thin adapters over the
//! [`diting_ledger::Ledger`] interface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use diting_ledger::DidDocument;
use diting_ledger::DidStatus;
use diting_ledger::Ledger;
use diting_ledger::LedgerError;
use serde::Deserialize;
use serde_json::json;

use crate::state::GatewayState;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the ledger or answers 503 when the chain is disabled.
fn ledger_of(state: &GatewayState) -> Result<Arc<dyn Ledger>, Response> {
    state.ledger.clone().ok_or_else(|| {
        (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "chain disabled" })))
            .into_response()
    })
}

/// Maps a ledger error onto an HTTP response.
fn ledger_error(err: &LedgerError) -> Response {
    match err {
        LedgerError::NotFound => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response()
        }
        LedgerError::EmptyBatch | LedgerError::Invalid(_) => {
            (StatusCode::BAD_REQUEST, Json(json!({ "error": err.to_string() }))).into_response()
        }
        LedgerError::Backend(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": err.to_string() })))
                .into_response()
        }
    }
}

// ============================================================================
// SECTION: DID Handlers
// ============================================================================

/// Body of `POST /chain/did/register`.
#[derive(Debug, Deserialize)]
pub(crate) struct DidRegisterRequest {
    /// DID to register.
    #[serde(default)]
    id: String,
    /// Public key material.
    #[serde(rename = "publicKey", default)]
    public_key: String,
    /// Environment fingerprint hash.
    #[serde(rename = "environmentFingerprint", default)]
    environment_fingerprint: String,
    /// Owner identifier.
    #[serde(default)]
    owner: String,
    /// Initial status; defaults to active.
    #[serde(default)]
    status: Option<DidStatus>,
}

/// `POST /chain/did/register`.
pub(crate) async fn did_register(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<DidRegisterRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let ledger = match ledger_of(&state) {
        Ok(ledger) => ledger,
        Err(response) => return response,
    };
    let Ok(Json(request)) = body else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid json" }))).into_response();
    };
    if request.id.is_empty() || request.public_key.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "id and publicKey required" })))
            .into_response();
    }
    let doc = DidDocument {
        id: request.id,
        public_key: request.public_key,
        environment_fingerprint: request.environment_fingerprint,
        owner: request.owner,
        status: request.status.unwrap_or(DidStatus::Active),
        created_at: None,
        updated_at: None,
    };
    match ledger.put_did(doc).await {
        Ok(tx_id) => Json(json!({ "tx_id": tx_id })).into_response(),
        Err(err) => ledger_error(&err),
    }
}

/// `GET /chain/did/{did}`.
pub(crate) async fn did_get(
    State(state): State<Arc<GatewayState>>,
    Path(did): Path<String>,
) -> Response {
    let ledger = match ledger_of(&state) {
        Ok(ledger) => ledger,
        Err(response) => return response,
    };
    match ledger.get_did(&did).await {
        Ok(doc) => Json(doc).into_response(),
        Err(err) => ledger_error(&err),
    }
}

// ============================================================================
// SECTION: Audit Handlers
// ============================================================================

/// Body of `POST /chain/audit/batch`.
#[derive(Debug, Deserialize)]
pub(crate) struct AuditBatchRequest {
    /// Batch identifier.
    #[serde(default)]
    batch_id: String,
    /// Trace id → leaf hash map.
    #[serde(default)]
    trace_id_hash: BTreeMap<String, String>,
}

/// `POST /chain/audit/batch`.
pub(crate) async fn audit_batch(
    State(state): State<Arc<GatewayState>>,
    body: Result<Json<AuditBatchRequest>, axum::extract::rejection::JsonRejection>,
) -> Response {
    let ledger = match ledger_of(&state) {
        Ok(ledger) => ledger,
        Err(response) => return response,
    };
    let Ok(Json(request)) = body else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid json" }))).into_response();
    };
    if request.batch_id.is_empty() || request.trace_id_hash.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "batch_id and trace_id_hash required" })),
        )
            .into_response();
    }
    match ledger.append_batch(&request.batch_id, &request.trace_id_hash).await {
        Ok(root) => Json(json!({ "tx_id": root, "merkle_root": root })).into_response(),
        Err(err) => ledger_error(&err),
    }
}

/// Query string of `GET /chain/audit/verify`.
#[derive(Debug, Deserialize)]
pub(crate) struct VerifyQuery {
    /// Trace id to fetch the proof for.
    #[serde(default)]
    trace_id: String,
}

/// `GET /chain/audit/verify?trace_id=X`.
pub(crate) async fn audit_verify(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<VerifyQuery>,
) -> Response {
    let ledger = match ledger_of(&state) {
        Ok(ledger) => ledger,
        Err(response) => return response,
    };
    if query.trace_id.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "missing trace_id" })))
            .into_response();
    }
    match ledger.merkle_proof(&query.trace_id).await {
        Ok(proof) => Json(proof).into_response(),
        Err(err) => ledger_error(&err),
    }
}

/// `GET /chain/health`.
pub(crate) async fn chain_health(State(state): State<Arc<GatewayState>>) -> Response {
    let ledger = match ledger_of(&state) {
        Ok(ledger) => ledger,
        Err(response) => return response,
    };
    match ledger.healthy().await {
        Ok(()) => Json(json!({ "status": "ok" })).into_response(),
        Err(err) => ledger_error(&err),
    }
}
