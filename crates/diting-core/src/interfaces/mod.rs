// crates/diting-core/src/interfaces/mod.rs
// ============================================================================
// Module: Diting Interfaces
// Description: Backend-agnostic interfaces for policy, stores, ownership,
//              delivery, and the confirmation engine.
// Purpose: Define the contract surfaces used by the decision pipeline.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with concrete backends
//! without embedding backend-specific detail. Implementations must be
//! deterministic for identical inputs and fail closed on missing or invalid
//! data. Stores hand objects out by value; the pipeline never retains them
//! across calls.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use thiserror::Error;

use crate::core::confirmation::ConfirmationObject;
use crate::core::confirmation::CreateInput;
use crate::core::context::RequestContext;
use crate::core::decision::Decision;
use crate::core::evidence::Evidence;

// ============================================================================
// SECTION: Policy Engine
// ============================================================================

/// Policy engine errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Rule source could not be read or parsed.
    #[error("policy rules load failed: {0}")]
    Load(String),
    /// Evaluation failed internally; recorded as `decision=error`.
    #[error("policy evaluation failed: {0}")]
    Evaluation(String),
}

/// Policy decision point over `(subject, action, resource)`.
pub trait PolicyEngine: Send + Sync {
    /// Evaluates a request context into a decision.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] only on internal failure; an unmatched request
    /// is a functional default-deny, not an error.
    fn evaluate(&self, ctx: &RequestContext) -> Result<Decision, PolicyError>;
}

// ============================================================================
// SECTION: Confirmation Store & Engine
// ============================================================================

/// CHEQ errors.
///
/// # Invariants
/// - `NotFound`, `AlreadyProcessed`, and `Expired` are protocol outcomes and
///   map onto client-visible statuses; `Store` signals backend failure.
#[derive(Debug, Error)]
pub enum CheqError {
    /// No confirmation object with the given identifier.
    #[error("confirmation object not found")]
    NotFound,
    /// The object already reached a terminal state.
    #[error("confirmation object already processed")]
    AlreadyProcessed,
    /// The object's deadline has passed.
    #[error("confirmation object expired")]
    Expired,
    /// Store backend failure.
    #[error("confirmation store error: {0}")]
    Store(String),
}

/// Persistence for confirmation objects, keyed by id.
///
/// Writes are whole-record and mutually exclusive; reads observe the last
/// committed version.
pub trait ConfirmationStore: Send + Sync {
    /// Persists an object, replacing any record under the same id.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError::Store`] when the write fails.
    fn put(&self, object: &ConfirmationObject) -> Result<(), CheqError>;

    /// Loads an object by id; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError::Store`] when the read fails.
    fn get(&self, id: &str) -> Result<Option<ConfirmationObject>, CheqError>;
}

/// CHEQ confirmation lifecycle engine.
#[async_trait]
pub trait ConfirmationEngine: Send + Sync {
    /// Creates a confirmation object and fans it out to approvers.
    ///
    /// Delivery is best-effort: a delivery failure is logged and does not
    /// affect the creation outcome.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError::Store`] when the object cannot be persisted.
    async fn create(&self, input: CreateInput) -> Result<ConfirmationObject, CheqError>;

    /// Reads an object, applying lazy expiry; `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError::Store`] when the read or expiry write-back fails.
    async fn get_by_id(&self, id: &str) -> Result<Option<ConfirmationObject>, CheqError>;

    /// Submits one vote idempotently.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError::NotFound`], [`CheqError::AlreadyProcessed`],
    /// [`CheqError::Expired`], or [`CheqError::Store`].
    async fn submit(&self, id: &str, approved: bool, confirmer_id: &str) -> Result<(), CheqError>;
}

// ============================================================================
// SECTION: Evidence Store
// ============================================================================

/// Audit store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Store I/O failure.
    #[error("audit store io error: {0}")]
    Io(String),
    /// Record serialization failure.
    #[error("audit record serialization failed: {0}")]
    Serialize(String),
}

/// Append-only audit store with point queries by trace id.
pub trait EvidenceStore: Send + Sync {
    /// Appends one evidence record.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the append fails.
    fn append(&self, evidence: &Evidence) -> Result<(), AuditError>;

    /// Returns all records whose trace id matches, in append order.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError`] when the scan fails.
    fn query_by_trace_id(&self, trace_id: &str) -> Result<Vec<Evidence>, AuditError>;
}

// ============================================================================
// SECTION: Ownership Resolver
// ============================================================================

/// Resolves the approver set owning a resource.
pub trait OwnershipResolver: Send + Sync {
    /// Returns the approver identifiers for `(resource, action)`.
    ///
    /// An empty result means no ownership mapping exists; callers fall back
    /// to their own approver configuration.
    fn resolve(&self, resource: &str, action: &str) -> Vec<String>;
}

// ============================================================================
// SECTION: Delivery Provider
// ============================================================================

/// Delivery errors.
///
/// # Invariants
/// - Delivery failures are informational; they never block the pipeline.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Delivery to the external channel failed.
    #[error("delivery failed: {0}")]
    Failed(String),
}

/// Options accompanying one delivery.
///
/// # Invariants
/// - This is a pure value container; providers must not mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverOptions {
    /// Approver identifiers to fan out to.
    pub confirmer_ids: Vec<String>,
    /// Human-readable summary for the approval message.
    pub summary: String,
    /// Channel tag, e.g. `feishu`.
    pub channel: String,
}

/// Input for one delivery: the object plus fan-out options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverInput {
    /// Confirmation object being delivered.
    pub object: ConfirmationObject,
    /// Fan-out options.
    pub options: DeliverOptions,
}

/// Delivers confirmation objects to human approvers.
///
/// Implementations are free to batch, retry, and choose their receive-id
/// kind, and must tolerate repeated deliveries for the same object (timeout
/// reminders reuse this entry point).
#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    /// Delivers one confirmation object.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] when the channel rejects the delivery; the
    /// object remains pending and usable via the out-of-band approval URL.
    async fn deliver(&self, input: &DeliverInput) -> Result<(), DeliveryError>;
}

/// No-op delivery provider.
///
/// # Invariants
/// - Deliveries are intentionally discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDeliveryProvider;

#[async_trait]
impl DeliveryProvider for NoopDeliveryProvider {
    async fn deliver(&self, _input: &DeliverInput) -> Result<(), DeliveryError> {
        Ok(())
    }
}
