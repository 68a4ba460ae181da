// crates/diting-core/src/lib.rs
// ============================================================================
// Module: Diting Core
// Description: Domain types, interfaces, and engines for the Diting gateway.
// Purpose: Provide the decision pipeline and confirmation engine shared by all
//          request surfaces.
// Dependencies: serde, thiserror, time, tokio, uuid
// ============================================================================

//! ## Overview
//! `diting-core` holds everything the request surfaces share: the evaluation
//! context and decision types, the CHEQ confirmation model, the audit evidence
//! record, the backend-agnostic interfaces, and the engines that implement
//! them (rule-based policy, ownership/approval matching, the CHEQ lifecycle,
//! and the decision pipeline). Durable stores and the ledger live in sibling
//! crates behind the interfaces defined here.
//!
//! Security posture: every input crossing these types originates from an
//! untrusted agent; engines fail closed (default deny, sticky terminal
//! confirmation states, append-only evidence).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod cheq;
pub mod core;
pub mod interfaces;
pub mod ownership;
pub mod pipeline;
pub mod policy;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::audit::InMemoryEvidenceStore;
pub use crate::cheq::CheqEngine;
pub use crate::cheq::InMemoryConfirmationStore;
pub use crate::core::confirmation::ApprovalPolicy;
pub use crate::core::confirmation::ConfirmationObject;
pub use crate::core::confirmation::ConfirmationStatus;
pub use crate::core::confirmation::CreateInput;
pub use crate::core::context::EXT_COMMAND_LINE;
pub use crate::core::context::EXT_RISK_LEVEL;
pub use crate::core::context::EXT_WORKING_DIR;
pub use crate::core::context::RequestContext;
pub use crate::core::decision::Decision;
pub use crate::core::decision::DecisionKind;
pub use crate::core::decision::EvidenceDecision;
pub use crate::core::evidence::Evidence;
pub use crate::interfaces::AuditError;
pub use crate::interfaces::CheqError;
pub use crate::interfaces::ConfirmationEngine;
pub use crate::interfaces::ConfirmationStore;
pub use crate::interfaces::DeliverInput;
pub use crate::interfaces::DeliverOptions;
pub use crate::interfaces::DeliveryError;
pub use crate::interfaces::DeliveryProvider;
pub use crate::interfaces::EvidenceStore;
pub use crate::interfaces::NoopDeliveryProvider;
pub use crate::interfaces::OwnershipResolver;
pub use crate::interfaces::PolicyEngine;
pub use crate::interfaces::PolicyError;
pub use crate::ownership::ApprovalRule;
pub use crate::ownership::ApprovalRuleMatch;
pub use crate::ownership::RuleMatcher;
pub use crate::ownership::StaticResolver;
pub use crate::pipeline::AuthDecision;
pub use crate::pipeline::AuthOutcome;
pub use crate::pipeline::DecisionPipeline;
pub use crate::pipeline::PipelineConfig;
pub use crate::pipeline::PipelineError;
pub use crate::pipeline::ReviewHandle;
pub use crate::policy::PolicyRule;
pub use crate::policy::RuleDecision;
pub use crate::policy::RulePolicyEngine;
pub use crate::policy::StubPolicyEngine;
pub use crate::policy::load_rules;
