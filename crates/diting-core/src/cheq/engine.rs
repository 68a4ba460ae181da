// crates/diting-core/src/cheq/engine.rs
// ============================================================================
// Module: CHEQ Engine Implementation
// Description: Store-backed confirmation engine with delivery fan-out.
// Purpose: Implement create, lazy-expiring reads, and idempotent submits.
// Dependencies: crate::core, crate::interfaces, uuid, time
// ============================================================================

//! ## Overview
//! [`CheqEngine`] persists every transition through a [`ConfirmationStore`]
//! and fans new objects out through a [`DeliveryProvider`]. Delivery is
//! best-effort: a failed delivery is logged and the object stays pending,
//! reachable through the out-of-band approval endpoint.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::core::confirmation::ApprovalPolicy;
use crate::core::confirmation::ConfirmationObject;
use crate::core::confirmation::ConfirmationStatus;
use crate::core::confirmation::CreateInput;
use crate::interfaces::CheqError;
use crate::interfaces::ConfirmationEngine;
use crate::interfaces::ConfirmationStore;
use crate::interfaces::DeliverInput;
use crate::interfaces::DeliverOptions;
use crate::interfaces::DeliveryProvider;
use crate::interfaces::OwnershipResolver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default review timeout applied when the configured value is zero.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Store-backed CHEQ engine.
///
/// # Invariants
/// - Terminal states are sticky; submits against them return
///   [`CheqError::AlreadyProcessed`] without modifying the store.
/// - `approved` is only written once the quorum condition holds.
pub struct CheqEngine {
    /// Persistence for confirmation objects.
    store: Arc<dyn ConfirmationStore>,
    /// Default review timeout.
    default_timeout: Duration,
    /// Default quorum policy when the input carries none.
    default_policy: ApprovalPolicy,
    /// Resolves the approver set owning a resource.
    resolver: Arc<dyn OwnershipResolver>,
    /// Fan-out channel to human approvers.
    delivery: Arc<dyn DeliveryProvider>,
}

impl CheqEngine {
    /// Creates an engine; a zero timeout falls back to 300 seconds.
    #[must_use]
    pub fn new(
        store: Arc<dyn ConfirmationStore>,
        timeout_secs: u64,
        default_policy: ApprovalPolicy,
        resolver: Arc<dyn OwnershipResolver>,
        delivery: Arc<dyn DeliveryProvider>,
    ) -> Self {
        let timeout_secs = if timeout_secs == 0 { DEFAULT_TIMEOUT_SECS } else { timeout_secs };
        Self {
            store,
            default_timeout: Duration::seconds(i64::try_from(timeout_secs).unwrap_or(i64::MAX)),
            default_policy,
            resolver,
            delivery,
        }
    }
}

#[async_trait]
impl ConfirmationEngine for CheqEngine {
    async fn create(&self, input: CreateInput) -> Result<ConfirmationObject, CheqError> {
        let now = OffsetDateTime::now_utc();
        let expires_at = input.expires_at.unwrap_or(now + self.default_timeout);

        let resolved = self.resolver.resolve(&input.resource, &input.action);
        let confirmer_ids = if resolved.is_empty() { input.confirmer_ids } else { resolved };

        let object = ConfirmationObject {
            id: Uuid::new_v4().to_string(),
            trace_id: input.trace_id,
            status: ConfirmationStatus::Pending,
            created_at: now,
            expires_at,
            resource: input.resource,
            action: input.action,
            summary: input.summary.clone(),
            confirmer_ids,
            approval_policy: input.approval_policy.unwrap_or(self.default_policy),
            approved_by: Vec::new(),
            kind: input.kind,
        };
        self.store.put(&object)?;

        let deliver = DeliverInput {
            object: object.clone(),
            options: DeliverOptions {
                confirmer_ids: object.confirmer_ids.clone(),
                summary: input.summary,
                channel: "feishu".to_string(),
            },
        };
        if let Err(err) = self.delivery.deliver(&deliver).await {
            tracing::warn!(
                id = %object.id,
                error = %err,
                "confirmation delivery failed; object stays pending and the approval url remains usable"
            );
        }
        Ok(object)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ConfirmationObject>, CheqError> {
        let Some(mut object) = self.store.get(id)? else {
            return Ok(None);
        };
        if !object.is_terminal() && object.is_past_expiry(OffsetDateTime::now_utc()) {
            object.status = ConfirmationStatus::Expired;
            self.store.put(&object)?;
        }
        Ok(Some(object))
    }

    async fn submit(&self, id: &str, approved: bool, confirmer_id: &str) -> Result<(), CheqError> {
        let Some(mut object) = self.store.get(id)? else {
            return Err(CheqError::NotFound);
        };
        if object.is_terminal() {
            return Err(CheqError::AlreadyProcessed);
        }
        if object.is_past_expiry(OffsetDateTime::now_utc()) {
            object.status = ConfirmationStatus::Expired;
            self.store.put(&object)?;
            return Err(CheqError::Expired);
        }
        if !approved {
            object.status = ConfirmationStatus::Rejected;
            return self.store.put(&object);
        }
        match object.approval_policy {
            ApprovalPolicy::Any => {
                object.status = ConfirmationStatus::Approved;
            }
            ApprovalPolicy::All => {
                if !confirmer_id.is_empty()
                    && !object.approved_by.iter().any(|id| id == confirmer_id)
                {
                    object.approved_by.push(confirmer_id.to_string());
                }
                if object.quorum_met() {
                    object.status = ConfirmationStatus::Approved;
                }
            }
        }
        self.store.put(&object)
    }
}
