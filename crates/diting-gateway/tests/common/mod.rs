// crates/diting-gateway/tests/common/mod.rs
// ============================================================================
// Module: Gateway Test Fixtures
// Description: Shared helpers spawning gateways and echo upstreams.
// Purpose: Keep surface tests focused on scenario assertions.
// Dependencies: diting-gateway, diting-core, diting-ledger
// ============================================================================

//! ## Overview
//! Spawns a fully wired gateway on an ephemeral port with in-memory stores,
//! a recording delivery provider (so tests learn confirmation ids the same
//! way approvers do), and optionally an echo upstream that captures the
//! headers it received.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    dead_code,
    reason = "Test-only fixtures shared across integration binaries."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use diting_core::ApprovalPolicy;
use diting_core::ApprovalRuleMatch;
use diting_core::CheqEngine;
use diting_core::ConfirmationEngine;
use diting_core::ConfirmationObject;
use diting_core::DecisionPipeline;
use diting_core::DeliverInput;
use diting_core::DeliveryError;
use diting_core::DeliveryProvider;
use diting_core::EvidenceStore;
use diting_core::InMemoryConfirmationStore;
use diting_core::InMemoryEvidenceStore;
use diting_core::NoopDeliveryProvider;
use diting_core::PipelineConfig;
use diting_core::PolicyRule;
use diting_core::RuleDecision;
use diting_core::RuleMatcher;
use diting_core::RulePolicyEngine;
use diting_core::StaticResolver;
use diting_gateway::GatewayState;
use diting_gateway::build_router;
use diting_ledger::LedgerImpl;
use diting_ledger::LocalBackend;
use tokio::sync::mpsc;

// ============================================================================
// SECTION: Recording Delivery
// ============================================================================

/// Delivery provider handing fanned-out objects to the test.
struct RecordingDelivery {
    delivered: mpsc::UnboundedSender<ConfirmationObject>,
}

#[async_trait]
impl DeliveryProvider for RecordingDelivery {
    async fn deliver(&self, input: &DeliverInput) -> Result<(), DeliveryError> {
        let _ = self.delivered.send(input.object.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Gateway Fixture
// ============================================================================

/// Options for one spawned test gateway.
pub struct FixtureOptions {
    /// Policy ruleset.
    pub rules: Vec<PolicyRule>,
    /// L0 allow-list.
    pub allowed_api_keys: Vec<String>,
    /// Default approval parameters.
    pub default_match: ApprovalRuleMatch,
    /// Upstream base URL for the proxy.
    pub upstream: String,
    /// Whether reviews wait for humans.
    pub review_requires_approval: bool,
    /// Pipeline and stream poll cadence.
    pub poll_interval: Duration,
    /// Mount an in-memory ledger.
    pub with_ledger: bool,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            rules: vec![rule("allow-all", RuleDecision::Allow)],
            allowed_api_keys: Vec::new(),
            default_match: ApprovalRuleMatch {
                timeout_secs: 60,
                approver_ids: vec!["u1".to_string(), "u2".to_string()],
                approval_policy: ApprovalPolicy::Any,
            },
            upstream: String::new(),
            review_requires_approval: true,
            poll_interval: Duration::from_millis(100),
            with_ledger: false,
        }
    }
}

/// Builds a wildcard rule with the given verdict.
pub fn rule(id: &str, decision: RuleDecision) -> PolicyRule {
    PolicyRule {
        id: id.to_string(),
        subject: String::new(),
        action: String::new(),
        resource: String::new(),
        decision,
        reason: String::new(),
    }
}

/// One spawned gateway bound to an ephemeral port.
pub struct TestGateway {
    /// Base URL, e.g. `http://127.0.0.1:49152`.
    pub base_url: String,
    /// Evidence store backing the pipeline.
    pub evidence: Arc<InMemoryEvidenceStore>,
    /// Confirmation engine for direct assertions.
    pub cheq: Arc<dyn ConfirmationEngine>,
    /// Plain HTTP client.
    pub client: reqwest::Client,
    /// Receiver of fanned-out confirmation objects.
    delivered: tokio::sync::Mutex<mpsc::UnboundedReceiver<ConfirmationObject>>,
}

impl TestGateway {
    /// Spawns a gateway with the given options.
    pub async fn spawn(options: FixtureOptions) -> Self {
        let evidence = Arc::new(InMemoryEvidenceStore::new());
        let (tx, rx) = mpsc::unbounded_channel();
        let cheq: Arc<CheqEngine> = Arc::new(CheqEngine::new(
            Arc::new(InMemoryConfirmationStore::new()),
            options.default_match.timeout_secs,
            ApprovalPolicy::Any,
            Arc::new(StaticResolver::default()),
            Arc::new(RecordingDelivery {
                delivered: tx,
            }),
        ));
        let pipeline = Arc::new(DecisionPipeline::new(
            Arc::new(RulePolicyEngine::with_rules(options.rules)),
            Arc::clone(&cheq) as Arc<dyn ConfirmationEngine>,
            Arc::clone(&evidence) as Arc<dyn EvidenceStore>,
            Arc::new(NoopDeliveryProvider),
            RuleMatcher::new(Vec::new(), options.default_match.clone()),
            PipelineConfig {
                allowed_api_keys: options.allowed_api_keys,
                cheq_timeout_secs: options.default_match.timeout_secs,
                reminder_secs_before_timeout: 60,
                review_requires_approval: options.review_requires_approval,
                poll_interval: options.poll_interval,
            },
        ));
        let ledger = options.with_ledger.then(|| {
            Arc::new(LedgerImpl::new(Arc::new(LocalBackend::in_memory())))
                as Arc<dyn diting_ledger::Ledger>
        });
        let state = Arc::new(
            GatewayState::new(Arc::clone(&pipeline), ledger, options.upstream)
                .with_stream_poll_interval(options.poll_interval),
        );
        let cheq_dyn = state.cheq.clone();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = build_router(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Self {
            base_url: format!("http://{addr}"),
            evidence,
            cheq: cheq_dyn,
            client: reqwest::Client::new(),
            delivered: tokio::sync::Mutex::new(rx),
        }
    }

    /// Returns an absolute URL under the gateway.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Waits for the next fanned-out confirmation object.
    pub async fn next_delivered(&self) -> ConfirmationObject {
        let mut receiver = self.delivered.lock().await;
        tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("delivery within 5s")
            .expect("delivery channel open")
    }
}

// ============================================================================
// SECTION: Echo Upstream
// ============================================================================

/// Echo upstream capturing the headers of every request it served.
pub struct TestUpstream {
    /// Base URL of the upstream.
    pub base_url: String,
    /// Captured header maps, one entry per request.
    pub seen: Arc<Mutex<Vec<BTreeMap<String, String>>>>,
}

/// Spawns the echo upstream on an ephemeral port.
pub async fn spawn_upstream() -> TestUpstream {
    let seen: Arc<Mutex<Vec<BTreeMap<String, String>>>> = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&seen);
    let router = Router::new().fallback(move |headers: HeaderMap| {
        let captured = Arc::clone(&captured);
        async move {
            let mut map = BTreeMap::new();
            for (name, value) in &headers {
                if let Ok(value) = value.to_str() {
                    map.insert(name.as_str().to_string(), value.to_string());
                }
            }
            captured.lock().unwrap().push(map);
            (StatusCode::OK, [("x-upstream", "echo")], "echo")
        }
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    TestUpstream {
        base_url: format!("http://{addr}"),
        seen,
    }
}
