// crates/diting-core/src/pipeline/tests.rs
// ============================================================================
// Module: Decision Pipeline Unit Tests
// Description: Unit tests for the shared evaluation path.
// Purpose: Validate the L0 gate, decision dispatch, review waits, and the
//          evidence trail with in-memory fixtures.
// Dependencies: diting-core
// ============================================================================

//! ## Overview
//! Exercises the pipeline against in-memory stores with short poll intervals:
//! allow/deny evidence, L0 rejections, blocking review approval and expiry,
//! auto-approval, and the non-blocking review handle.

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

use std::sync::Arc;
use std::time::Duration;

use crate::audit::InMemoryEvidenceStore;
use crate::cheq::CheqEngine;
use crate::interfaces::EvidenceStore;
use crate::cheq::InMemoryConfirmationStore;
use crate::core::confirmation::ApprovalPolicy;
use crate::core::confirmation::ConfirmationStatus;
use crate::core::context::RequestContext;
use crate::core::decision::EvidenceDecision;
use crate::interfaces::ConfirmationEngine;
use crate::interfaces::NoopDeliveryProvider;
use crate::ownership::ApprovalRuleMatch;
use crate::ownership::RuleMatcher;
use crate::ownership::StaticResolver;
use crate::pipeline::AuthOutcome;
use crate::pipeline::DecisionPipeline;
use crate::pipeline::PipelineConfig;
use crate::policy::PolicyRule;
use crate::policy::RuleDecision;
use crate::policy::RulePolicyEngine;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Delivery provider that hands created objects to the test over a channel.
struct RecordingDelivery {
    delivered: tokio::sync::mpsc::UnboundedSender<crate::core::confirmation::ConfirmationObject>,
}

#[async_trait::async_trait]
impl crate::interfaces::DeliveryProvider for RecordingDelivery {
    async fn deliver(
        &self,
        input: &crate::interfaces::DeliverInput,
    ) -> Result<(), crate::interfaces::DeliveryError> {
        let _ = self.delivered.send(input.object.clone());
        Ok(())
    }
}

struct Fixture {
    pipeline: DecisionPipeline,
    evidence: Arc<InMemoryEvidenceStore>,
    cheq: Arc<CheqEngine>,
    delivered: tokio::sync::mpsc::UnboundedReceiver<crate::core::confirmation::ConfirmationObject>,
}

fn fixture(decision: RuleDecision, config: PipelineConfig) -> Fixture {
    fixture_with_matcher(decision, config, RuleMatcher::default())
}

fn fixture_with_matcher(
    decision: RuleDecision,
    config: PipelineConfig,
    matcher: RuleMatcher,
) -> Fixture {
    let evidence = Arc::new(InMemoryEvidenceStore::new());
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let cheq = Arc::new(CheqEngine::new(
        Arc::new(InMemoryConfirmationStore::new()),
        config.cheq_timeout_secs,
        ApprovalPolicy::Any,
        Arc::new(StaticResolver::default()),
        Arc::new(RecordingDelivery {
            delivered: tx,
        }),
    ));
    let policy = RulePolicyEngine::with_rules(vec![PolicyRule {
        id: "r1".to_string(),
        subject: String::new(),
        action: String::new(),
        resource: String::new(),
        decision,
        reason: String::new(),
    }]);
    let pipeline = DecisionPipeline::new(
        Arc::new(policy),
        Arc::clone(&cheq) as Arc<dyn ConfirmationEngine>,
        Arc::clone(&evidence) as Arc<dyn crate::interfaces::EvidenceStore>,
        Arc::new(NoopDeliveryProvider),
        matcher,
        config,
    );
    Fixture {
        pipeline,
        evidence,
        cheq,
        delivered: rx,
    }
}

fn fast_config(timeout_secs: u64) -> PipelineConfig {
    PipelineConfig {
        cheq_timeout_secs: timeout_secs,
        poll_interval: Duration::from_millis(50),
        ..PipelineConfig::default()
    }
}

fn ctx() -> RequestContext {
    RequestContext {
        agent_identity: "agent-1".to_string(),
        method: "GET".to_string(),
        target_url: "http://upstream/foo".to_string(),
        resource: "/foo".to_string(),
        action: "GET".to_string(),
        ..RequestContext::default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn allow_emits_single_allow_evidence() {
    let fx = fixture(RuleDecision::Allow, fast_config(5));
    let response = fx.pipeline.evaluate_blocking("trace-allow", &ctx()).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Allow);
    assert_eq!(response.policy_rule_id, "r1");

    let records = fx.evidence.query_by_trace_id("trace-allow").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, EvidenceDecision::Allow);
    assert_eq!(records[0].agent_id, "agent-1");
}

#[tokio::test]
async fn deny_emits_single_deny_evidence() {
    let fx = fixture(RuleDecision::Deny, fast_config(5));
    let response = fx.pipeline.evaluate_blocking("trace-deny", &ctx()).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Deny);
    let records = fx.evidence.query_by_trace_id("trace-deny").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, EvidenceDecision::Deny);
}

#[tokio::test]
async fn l0_missing_and_invalid_are_rejected_with_evidence() {
    let config = PipelineConfig {
        allowed_api_keys: vec!["k1".to_string()],
        ..fast_config(5)
    };
    let fx = fixture(RuleDecision::Allow, config);

    let mut anonymous = ctx();
    anonymous.agent_identity = String::new();
    let response = fx.pipeline.evaluate_blocking("trace-l0", &anonymous).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Deny);
    assert_eq!(response.reason, "missing or invalid agent identity");

    let mut wrong = ctx();
    wrong.agent_identity = "Bearer other".to_string();
    let response = fx.pipeline.evaluate_blocking("trace-l0", &wrong).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Deny);
    assert_eq!(response.reason, "invalid agent identity");

    let records = fx.evidence.query_by_trace_id("trace-l0").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].decision, EvidenceDecision::L0Missing);
    assert_eq!(records[1].decision, EvidenceDecision::L0Invalid);

    // A listed key passes the gate, with or without the Bearer prefix.
    let mut listed = ctx();
    listed.agent_identity = "Bearer k1".to_string();
    let response = fx.pipeline.evaluate_blocking("trace-l0-ok", &listed).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Allow);
}

#[tokio::test]
async fn review_approved_externally_unblocks_with_terminal_evidence() {
    let matcher = RuleMatcher::new(
        Vec::new(),
        ApprovalRuleMatch {
            timeout_secs: 60,
            approver_ids: vec!["u1".to_string(), "u2".to_string()],
            approval_policy: ApprovalPolicy::Any,
        },
    );
    let mut fx = fixture_with_matcher(RuleDecision::Review, fast_config(60), matcher);
    let cheq = Arc::clone(&fx.cheq);

    let approve_ctx = ctx();
    let (response, _) = tokio::join!(fx.pipeline.evaluate_blocking("trace-approve", &approve_ctx), async {
        // The engine fans the fresh object out on create; vote once it lands.
        let object = fx.delivered.recv().await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cheq.submit(&object.id, true, "").await.unwrap();
    });
    let response = response.unwrap();
    assert_eq!(response.decision, AuthOutcome::Allow);
    assert!(response.cheq_id.is_some());

    let records = fx.evidence.query_by_trace_id("trace-approve").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, EvidenceDecision::Approved);
    assert_eq!(records[0].cheq_status, "approved");
    assert_eq!(records[0].confirmer, "u1,u2");
}

#[tokio::test]
async fn review_without_votes_expires_and_denies() {
    let matcher = RuleMatcher::new(
        Vec::new(),
        ApprovalRuleMatch {
            timeout_secs: 1,
            approver_ids: vec!["u1".to_string()],
            approval_policy: ApprovalPolicy::Any,
        },
    );
    let fx = fixture_with_matcher(RuleDecision::Review, fast_config(1), matcher);
    let response = fx.pipeline.evaluate_blocking("trace-expire", &ctx()).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Deny);
    assert_eq!(response.reason, "confirmation expired");

    let cheq_id = response.cheq_id.unwrap();
    let object = fx.cheq.get_by_id(&cheq_id).await.unwrap().unwrap();
    assert_eq!(object.status, ConfirmationStatus::Expired);

    let records = fx.evidence.query_by_trace_id("trace-expire").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, EvidenceDecision::Expired);
    assert_eq!(records[0].cheq_status, "expired");
}

#[tokio::test]
async fn auto_approve_when_review_does_not_require_approval() {
    let config = PipelineConfig {
        review_requires_approval: false,
        ..fast_config(5)
    };
    let matcher = RuleMatcher::new(
        Vec::new(),
        ApprovalRuleMatch {
            timeout_secs: 5,
            approver_ids: vec!["u1".to_string()],
            approval_policy: ApprovalPolicy::Any,
        },
    );
    let fx = fixture_with_matcher(RuleDecision::Review, config, matcher);
    let response = fx.pipeline.evaluate_blocking("trace-auto", &ctx()).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Allow);
    let cheq_id = response.cheq_id.unwrap();

    let object = fx.cheq.get_by_id(&cheq_id).await.unwrap().unwrap();
    assert_eq!(object.status, ConfirmationStatus::Approved);

    let records = fx.evidence.query_by_trace_id("trace-auto").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, EvidenceDecision::Approved);
    assert_eq!(records[0].cheq_status, "approved");
    assert_eq!(records[0].confirmer, "u1");
}

#[tokio::test]
async fn non_blocking_review_returns_handle_and_records_later() {
    let matcher = RuleMatcher::new(
        Vec::new(),
        ApprovalRuleMatch {
            timeout_secs: 30,
            approver_ids: vec!["u1".to_string()],
            approval_policy: ApprovalPolicy::Any,
        },
    );
    let fx = fixture_with_matcher(RuleDecision::Review, fast_config(30), matcher);
    let context = ctx();
    let (response, handle) =
        fx.pipeline.evaluate_non_blocking("trace-nb", &context).await.unwrap();
    assert_eq!(response.decision, AuthOutcome::Review);
    let handle = handle.unwrap();
    assert_eq!(response.cheq_id.as_deref(), Some(handle.cheq_id.as_str()));
    assert_eq!(response.approval_timeout_sec, Some(30));
    // No evidence yet: the surface records the terminal status itself.
    assert!(fx.evidence.query_by_trace_id("trace-nb").unwrap().is_empty());

    fx.cheq.submit(&handle.cheq_id, true, "").await.unwrap();
    let object = fx.cheq.get_by_id(&handle.cheq_id).await.unwrap().unwrap();
    fx.pipeline.record_cheq_decision(
        "trace-nb",
        &context,
        &handle.policy_rule_id,
        &handle.decision_reason,
        &handle.cheq_id,
        object.status,
        &object.confirmer_ids,
    );
    let records = fx.evidence.query_by_trace_id("trace-nb").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, EvidenceDecision::Approved);
    assert_eq!(records[0].confirmer, "u1");
}

#[tokio::test]
async fn evidence_timestamps_are_monotone_within_a_trace() {
    let config = PipelineConfig {
        allowed_api_keys: vec!["k1".to_string()],
        ..fast_config(5)
    };
    let fx = fixture(RuleDecision::Allow, config);
    let mut anonymous = ctx();
    anonymous.agent_identity = String::new();
    for _ in 0..3 {
        let _ = fx.pipeline.evaluate_blocking("trace-mono", &anonymous).await.unwrap();
    }
    let records = fx.evidence.query_by_trace_id("trace-mono").unwrap();
    assert_eq!(records.len(), 3);
    for pair in records.windows(2) {
        assert!(pair[1].timestamp >= pair[0].timestamp);
    }
}
