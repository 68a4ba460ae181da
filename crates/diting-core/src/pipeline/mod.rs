// crates/diting-core/src/pipeline/mod.rs
// ============================================================================
// Module: Decision Pipeline
// Description: L0 identity gate → policy → CHEQ → evidence orchestration.
// Purpose: Provide the shared evaluation path behind every request surface.
// Dependencies: crate::core, crate::interfaces, crate::ownership, tokio
// ============================================================================

//! ## Overview
//! Every intercepted action flows through one [`DecisionPipeline`]:
//!
//! 1. the L0 identity gate (when an allow-list is configured);
//! 2. the policy engine (`allow | deny | review`);
//! 3. on `review`, CHEQ creation with approval parameters from the rule
//!    matcher, then either a blocking poll until a terminal status or a
//!    non-blocking return with a [`ReviewHandle`];
//! 4. exactly one evidence record per step, appended in causal order.
//!
//! The pipeline never retains confirmation objects across calls; it always
//! re-reads through the engine so lazy expiry and sticky terminal states are
//! observed consistently.

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::core::confirmation::ApprovalPolicy;
use crate::core::confirmation::ConfirmationObject;
use crate::core::confirmation::ConfirmationStatus;
use crate::core::confirmation::CreateInput;
use crate::core::confirmation::KIND_OPERATION_APPROVAL;
use crate::core::context::RequestContext;
use crate::core::decision::DecisionKind;
use crate::core::decision::EvidenceDecision;
use crate::core::evidence::Evidence;
use crate::interfaces::CheqError;
use crate::interfaces::ConfirmationEngine;
use crate::interfaces::DeliverInput;
use crate::interfaces::DeliverOptions;
use crate::interfaces::DeliveryProvider;
use crate::interfaces::EvidenceStore;
use crate::interfaces::PolicyEngine;
use crate::interfaces::PolicyError;
use crate::ownership::RuleMatcher;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default review timeout applied when the configured value is zero.
const DEFAULT_TIMEOUT_SECS: u64 = 300;
/// Default reminder window before expiry, in seconds.
const DEFAULT_REMINDER_SECS: u64 = 60;
/// Cadence of terminal-status polls inside the blocking path.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Rule id recorded for L0 identity gate decisions.
const L0_RULE_ID: &str = "l0";
/// Rule id recorded when CHEQ creation fails.
const CHEQ_CREATE_RULE_ID: &str = "cheq_create";
/// Rule id recorded when the policy engine fails internally.
const PDP_ERROR_RULE_ID: &str = "pdp_error";

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Pipeline tuning knobs shared by every surface.
///
/// # Invariants
/// - Zero values for timeout and reminder fall back to the defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// L0 allow-list; empty disables the identity gate.
    pub allowed_api_keys: Vec<String>,
    /// Default review timeout in seconds.
    pub cheq_timeout_secs: u64,
    /// Seconds before expiry at which the single reminder is delivered.
    pub reminder_secs_before_timeout: u64,
    /// When false, reviews self-approve immediately (staging behavior).
    pub review_requires_approval: bool,
    /// Poll cadence of the blocking review wait.
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            allowed_api_keys: Vec::new(),
            cheq_timeout_secs: DEFAULT_TIMEOUT_SECS,
            reminder_secs_before_timeout: DEFAULT_REMINDER_SECS,
            review_requires_approval: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PipelineConfig {
    /// Returns the effective default review timeout in seconds.
    #[must_use]
    const fn timeout_secs(&self) -> u64 {
        if self.cheq_timeout_secs == 0 { DEFAULT_TIMEOUT_SECS } else { self.cheq_timeout_secs }
    }

    /// Returns the effective reminder window in seconds.
    #[must_use]
    const fn reminder_secs(&self) -> u64 {
        if self.reminder_secs_before_timeout == 0 {
            DEFAULT_REMINDER_SECS
        } else {
            self.reminder_secs_before_timeout
        }
    }
}

// ============================================================================
// SECTION: Response Shape
// ============================================================================

/// Client-visible outcome of one evaluation.
///
/// # Invariants
/// - Labels are stable wire strings (`allow`, `deny`, `review`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthOutcome {
    /// The surface performs the downstream action.
    Allow,
    /// The surface refuses the action.
    Deny,
    /// The action is suspended pending confirmation (non-blocking only).
    Review,
}

impl AuthOutcome {
    /// Returns the stable wire label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Review => "review",
        }
    }
}

/// Response shape shared by the exec endpoint, the proxy, and the stream.
///
/// # Invariants
/// - `cheq_id` and `approval_timeout_sec` are present exactly when a
///   confirmation object was created for the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthDecision {
    /// Client-visible outcome.
    pub decision: AuthOutcome,
    /// Identifier of the rule behind the decision.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub policy_rule_id: String,
    /// Human-readable reason.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    /// Confirmation object id for review follow-up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cheq_id: Option<String>,
    /// Review timeout communicated to the caller, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_timeout_sec: Option<u64>,
}

impl AuthDecision {
    /// Builds a bare decision without review metadata.
    #[must_use]
    fn bare(decision: AuthOutcome, policy_rule_id: &str, reason: &str) -> Self {
        Self {
            decision,
            policy_rule_id: policy_rule_id.to_string(),
            reason: reason.to_string(),
            cheq_id: None,
            approval_timeout_sec: None,
        }
    }
}

/// Review bundle handed to non-blocking surfaces.
///
/// The surface polls CHEQ itself and calls
/// [`DecisionPipeline::record_cheq_decision`] once a terminal status is
/// observed, so the terminal evidence carries the original rule and reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewHandle {
    /// Confirmation object id to poll.
    pub cheq_id: String,
    /// Rule id of the review decision.
    pub policy_rule_id: String,
    /// Reason of the review decision.
    pub decision_reason: String,
    /// Review timeout in seconds.
    pub timeout_secs: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Pipeline failures surfaced to the caller as HTTP 500s.
///
/// # Invariants
/// - Every variant has already been recorded as an evidence line before it
///   propagates.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Policy engine internal failure.
    #[error("policy evaluation failed: {0}")]
    Policy(#[from] PolicyError),
    /// CHEQ creation failure while entering review.
    #[error("confirmation create failed: {0}")]
    Review(#[from] CheqError),
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// Shared decision pipeline.
///
/// # Invariants
/// - Evidence for one trace is appended in causal order.
/// - The pipeline holds no per-request state; it is safe to share.
pub struct DecisionPipeline {
    /// Policy decision point.
    policy: Arc<dyn PolicyEngine>,
    /// Confirmation lifecycle engine.
    cheq: Arc<dyn ConfirmationEngine>,
    /// Append-only audit store.
    evidence: Arc<dyn EvidenceStore>,
    /// Reminder fan-out channel.
    delivery: Arc<dyn DeliveryProvider>,
    /// Approval parameter matcher.
    matcher: RuleMatcher,
    /// Tuning knobs.
    config: PipelineConfig,
}

impl DecisionPipeline {
    /// Creates a pipeline over the given components.
    #[must_use]
    pub fn new(
        policy: Arc<dyn PolicyEngine>,
        cheq: Arc<dyn ConfirmationEngine>,
        evidence: Arc<dyn EvidenceStore>,
        delivery: Arc<dyn DeliveryProvider>,
        matcher: RuleMatcher,
        config: PipelineConfig,
    ) -> Self {
        Self {
            policy,
            cheq,
            evidence,
            delivery,
            matcher,
            config,
        }
    }

    /// Returns the confirmation engine for surface-level follow-up calls.
    #[must_use]
    pub fn confirmations(&self) -> Arc<dyn ConfirmationEngine> {
        Arc::clone(&self.cheq)
    }

    /// Returns the evidence store for surface-level debug queries.
    #[must_use]
    pub fn evidence_store(&self) -> Arc<dyn EvidenceStore> {
        Arc::clone(&self.evidence)
    }

    /// Reads a confirmation object on behalf of a surface poller.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError`] when the underlying read fails.
    pub async fn get_cheq_by_id(&self, id: &str) -> Result<Option<ConfirmationObject>, CheqError> {
        self.cheq.get_by_id(id).await
    }

    /// Evaluates a request and, on review, waits for the terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on policy-internal or CHEQ-creation failure;
    /// the corresponding evidence has already been appended.
    pub async fn evaluate_blocking(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
    ) -> Result<AuthDecision, PipelineError> {
        if let Some(rejection) = self.l0_gate(trace_id, ctx) {
            return Ok(rejection);
        }
        let decision = self.evaluate_policy(trace_id, ctx)?;
        match decision.kind {
            DecisionKind::Allow => {
                self.append(trace_id, ctx, EvidenceDecision::Allow, &decision.policy_rule_id, &decision.decision_reason);
                Ok(AuthDecision::bare(AuthOutcome::Allow, &decision.policy_rule_id, &decision.decision_reason))
            }
            DecisionKind::Deny => {
                self.append(trace_id, ctx, EvidenceDecision::Deny, &decision.policy_rule_id, &decision.decision_reason);
                Ok(AuthDecision::bare(AuthOutcome::Deny, &decision.policy_rule_id, &decision.decision_reason))
            }
            DecisionKind::Review => {
                let (object, timeout_secs) =
                    self.enter_review(trace_id, ctx).await?;
                if !self.config.review_requires_approval {
                    return Ok(self
                        .auto_approve(trace_id, ctx, &decision.policy_rule_id, &decision.decision_reason, &object, timeout_secs)
                        .await);
                }
                Ok(self
                    .wait_for_terminal(trace_id, ctx, &decision.policy_rule_id, &decision.decision_reason, &object, timeout_secs)
                    .await)
            }
        }
    }

    /// Evaluates a request; on review, returns immediately with a handle.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on policy-internal or CHEQ-creation failure;
    /// the corresponding evidence has already been appended.
    pub async fn evaluate_non_blocking(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
    ) -> Result<(AuthDecision, Option<ReviewHandle>), PipelineError> {
        if let Some(rejection) = self.l0_gate(trace_id, ctx) {
            return Ok((rejection, None));
        }
        let decision = self.evaluate_policy(trace_id, ctx)?;
        match decision.kind {
            DecisionKind::Allow => {
                self.append(trace_id, ctx, EvidenceDecision::Allow, &decision.policy_rule_id, &decision.decision_reason);
                Ok((
                    AuthDecision::bare(AuthOutcome::Allow, &decision.policy_rule_id, &decision.decision_reason),
                    None,
                ))
            }
            DecisionKind::Deny => {
                self.append(trace_id, ctx, EvidenceDecision::Deny, &decision.policy_rule_id, &decision.decision_reason);
                Ok((
                    AuthDecision::bare(AuthOutcome::Deny, &decision.policy_rule_id, &decision.decision_reason),
                    None,
                ))
            }
            DecisionKind::Review => {
                let (object, timeout_secs) =
                    self.enter_review(trace_id, ctx).await?;
                if !self.config.review_requires_approval {
                    let approved = self
                        .auto_approve(trace_id, ctx, &decision.policy_rule_id, &decision.decision_reason, &object, timeout_secs)
                        .await;
                    return Ok((approved, None));
                }
                let mut response = AuthDecision::bare(
                    AuthOutcome::Review,
                    &decision.policy_rule_id,
                    &decision.decision_reason,
                );
                response.cheq_id = Some(object.id.clone());
                response.approval_timeout_sec = Some(timeout_secs);
                let handle = ReviewHandle {
                    cheq_id: object.id,
                    policy_rule_id: decision.policy_rule_id,
                    decision_reason: decision.decision_reason,
                    timeout_secs,
                };
                Ok((response, Some(handle)))
            }
        }
    }

    /// Records the terminal evidence for a non-blocking review.
    ///
    /// Called by surfaces that polled CHEQ themselves, right before pushing
    /// the final decision to the client.
    pub fn record_cheq_decision(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
        policy_rule_id: &str,
        decision_reason: &str,
        cheq_id: &str,
        final_status: ConfirmationStatus,
        confirmer_ids: &[String],
    ) {
        tracing::debug!(trace_id, cheq_id, status = final_status.as_str(), "recording cheq terminal decision");
        self.append_with_cheq(
            trace_id,
            ctx,
            EvidenceDecision::from(final_status),
            policy_rule_id,
            decision_reason,
            final_status.as_str(),
            confirmer_ids,
        );
    }

    // ------------------------------------------------------------------
    // Internal steps
    // ------------------------------------------------------------------

    /// Runs the L0 identity gate; `Some` is a finished rejection.
    fn l0_gate(&self, trace_id: &str, ctx: &RequestContext) -> Option<AuthDecision> {
        if self.config.allowed_api_keys.is_empty() {
            return None;
        }
        let token =
            ctx.agent_identity.strip_prefix("Bearer ").unwrap_or(&ctx.agent_identity).trim();
        if token.is_empty() {
            self.append(trace_id, ctx, EvidenceDecision::L0Missing, L0_RULE_ID, "missing or empty agent identity");
            return Some(AuthDecision::bare(
                AuthOutcome::Deny,
                L0_RULE_ID,
                "missing or invalid agent identity",
            ));
        }
        if !self.config.allowed_api_keys.iter().any(|key| key == token) {
            self.append(trace_id, ctx, EvidenceDecision::L0Invalid, L0_RULE_ID, "agent identity not in allowed list");
            return Some(AuthDecision::bare(AuthOutcome::Deny, L0_RULE_ID, "invalid agent identity"));
        }
        None
    }

    /// Evaluates policy, recording internal failures as `decision=error`.
    fn evaluate_policy(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
    ) -> Result<crate::core::decision::Decision, PipelineError> {
        match self.policy.evaluate(ctx) {
            Ok(decision) => Ok(decision),
            Err(err) => {
                self.append(trace_id, ctx, EvidenceDecision::Error, PDP_ERROR_RULE_ID, &err.to_string());
                Err(PipelineError::Policy(err))
            }
        }
    }

    /// Resolves approval parameters and creates the confirmation object.
    async fn enter_review(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
    ) -> Result<(ConfirmationObject, u64), PipelineError> {
        let resource = ctx.resource_or_target().to_string();
        let matched = self.matcher.matches(&resource, ctx.risk_level());
        let timeout_secs = if matched.timeout_secs > 0 {
            matched.timeout_secs
        } else {
            self.config.timeout_secs()
        };
        let approval_policy: Option<ApprovalPolicy> = Some(matched.approval_policy);
        let summary = if ctx.target_url.is_empty() {
            format!("{} {}", ctx.action, ctx.resource)
        } else {
            ctx.target_url.clone()
        };
        let expires_at =
            OffsetDateTime::now_utc() + time::Duration::seconds(i64::try_from(timeout_secs).unwrap_or(i64::MAX));
        let input = CreateInput {
            trace_id: trace_id.to_string(),
            resource,
            action: ctx.action.clone(),
            summary,
            expires_at: Some(expires_at),
            confirmer_ids: matched.approver_ids,
            kind: KIND_OPERATION_APPROVAL.to_string(),
            approval_policy,
        };
        match self.cheq.create(input).await {
            Ok(object) => Ok((object, timeout_secs)),
            Err(err) => {
                self.append(trace_id, ctx, EvidenceDecision::ReviewError, CHEQ_CREATE_RULE_ID, &err.to_string());
                Err(PipelineError::Review(err))
            }
        }
    }

    /// Self-approves a review when approval is not required.
    async fn auto_approve(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
        policy_rule_id: &str,
        decision_reason: &str,
        object: &ConfirmationObject,
        timeout_secs: u64,
    ) -> AuthDecision {
        if let Err(err) = self.cheq.submit(&object.id, true, "").await {
            tracing::warn!(id = %object.id, error = %err, "auto-approve submit failed");
        }
        self.append_with_cheq(
            trace_id,
            ctx,
            EvidenceDecision::Approved,
            policy_rule_id,
            decision_reason,
            ConfirmationStatus::Approved.as_str(),
            &object.confirmer_ids,
        );
        let mut response = AuthDecision::bare(AuthOutcome::Allow, policy_rule_id, decision_reason);
        response.cheq_id = Some(object.id.clone());
        response.approval_timeout_sec = Some(timeout_secs);
        response
    }

    /// Polls CHEQ until a terminal status or the deadline, with one reminder.
    async fn wait_for_terminal(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
        policy_rule_id: &str,
        decision_reason: &str,
        object: &ConfirmationObject,
        timeout_secs: u64,
    ) -> AuthDecision {
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);
        let reminder_window = time::Duration::seconds(
            i64::try_from(self.config.reminder_secs()).unwrap_or(i64::MAX),
        );
        let mut reminded = false;
        let mut final_status: Option<ConfirmationStatus> = None;
        let mut last_seen: Option<ConfirmationObject> = None;

        while Instant::now() < deadline {
            match self.cheq.get_by_id(&object.id).await {
                Ok(Some(current)) => {
                    if current.is_terminal() {
                        final_status = Some(current.status);
                        last_seen = Some(current);
                        break;
                    }
                    let remaining = current.expires_at - OffsetDateTime::now_utc();
                    if !reminded && remaining <= reminder_window {
                        reminded = true;
                        self.send_reminder(&current).await;
                    }
                    last_seen = Some(current);
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(id = %object.id, error = %err, "cheq poll failed; retrying");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        let status = final_status.unwrap_or(ConfirmationStatus::Expired);
        let confirmer_ids =
            last_seen.map_or_else(|| object.confirmer_ids.clone(), |seen| seen.confirmer_ids);
        self.append_with_cheq(
            trace_id,
            ctx,
            EvidenceDecision::from(status),
            policy_rule_id,
            decision_reason,
            status.as_str(),
            &confirmer_ids,
        );
        let mut response = if status == ConfirmationStatus::Approved {
            AuthDecision::bare(AuthOutcome::Allow, policy_rule_id, decision_reason)
        } else {
            AuthDecision::bare(
                AuthOutcome::Deny,
                policy_rule_id,
                &format!("confirmation {}", status.as_str()),
            )
        };
        response.cheq_id = Some(object.id.clone());
        response.approval_timeout_sec = Some(timeout_secs);
        response
    }

    /// Sends the single pre-expiry reminder, best-effort.
    async fn send_reminder(&self, object: &ConfirmationObject) {
        let input = DeliverInput {
            object: object.clone(),
            options: DeliverOptions {
                confirmer_ids: object.confirmer_ids.clone(),
                summary: format!("[reminder] {}", object.summary),
                channel: "feishu".to_string(),
            },
        };
        if let Err(err) = self.delivery.deliver(&input).await {
            tracing::warn!(id = %object.id, error = %err, "reminder delivery failed");
        }
    }

    /// Appends one evidence record without CHEQ context.
    fn append(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
        decision: EvidenceDecision,
        policy_rule_id: &str,
        reason: &str,
    ) {
        self.append_with_cheq(trace_id, ctx, decision, policy_rule_id, reason, "", &[]);
    }

    /// Appends one evidence record carrying CHEQ status and confirmers.
    fn append_with_cheq(
        &self,
        trace_id: &str,
        ctx: &RequestContext,
        decision: EvidenceDecision,
        policy_rule_id: &str,
        reason: &str,
        cheq_status: &str,
        confirmer_ids: &[String],
    ) {
        let record = Evidence {
            trace_id: trace_id.to_string(),
            span_id: None,
            agent_id: ctx.agent_identity.clone(),
            policy_rule_id: policy_rule_id.to_string(),
            decision_reason: reason.to_string(),
            decision,
            cheq_status: cheq_status.to_string(),
            confirmer: confirmer_ids.join(","),
            timestamp: OffsetDateTime::now_utc(),
            resource: ctx.resource.clone(),
            action: ctx.action.clone(),
        };
        if let Err(err) = self.evidence.append(&record) {
            tracing::error!(trace_id, error = %err, "evidence append failed");
        }
    }
}
