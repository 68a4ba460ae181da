// crates/diting-config/src/model.rs
// ============================================================================
// Module: Configuration Model
// Description: Serde model of the gateway configuration tree.
// Purpose: Mirror the YAML layout with defaults for every optional field.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every section and field defaults so a minimal YAML file (or an empty one)
//! still produces a usable configuration: memory-only stores, no L0 gate, no
//! delivery channel, chain disabled.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Root
// ============================================================================

/// Root configuration tree.
///
/// # Invariants
/// - Immutable after [`crate::load`] returns; normalization has already been
///   applied (approver list and approval policy).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Proxy listener and L0 gate.
    #[serde(default)]
    pub proxy: ProxyConfig,
    /// Policy engine rule source.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// CHEQ timeouts and persistence.
    #[serde(default)]
    pub cheq: CheqConfig,
    /// Delivery channel configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Audit log path and redaction.
    #[serde(default)]
    pub audit: AuditConfig,
    /// Ownership and approval matching.
    #[serde(default)]
    pub ownership: OwnershipConfig,
    /// Ledger (chain) configuration.
    #[serde(default)]
    pub chain: ChainConfig,
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Proxy listener, upstream, and L0 allow-list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Listen address, e.g. `:8080` or `127.0.0.1:8080`.
    #[serde(default)]
    pub listen_addr: String,
    /// Upstream base URL the proxy forwards to.
    #[serde(default)]
    pub upstream: String,
    /// Allowed L0 API keys; empty disables the identity gate.
    #[serde(default)]
    pub allowed_api_keys: Vec<String>,
}

/// Policy engine rule source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Path of the YAML ruleset; empty means the stub allow-all engine.
    #[serde(default)]
    pub rules_path: String,
}

/// CHEQ timeouts and persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheqConfig {
    /// Default review timeout in seconds (0 → 300).
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Seconds before expiry at which the reminder is sent (0 → 60).
    #[serde(default)]
    pub reminder_seconds_before_timeout: u64,
    /// Directory for one-file-per-object persistence; empty is memory-only.
    #[serde(default)]
    pub persistence_path: String,
    /// Whether review decisions wait for a human (false self-approves).
    #[serde(default = "default_true")]
    pub review_requires_approval: bool,
}

impl Default for CheqConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 0,
            reminder_seconds_before_timeout: 0,
            persistence_path: String::new(),
            review_requires_approval: true,
        }
    }
}

/// Delivery channels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Feishu application channel.
    #[serde(default)]
    pub feishu: FeishuConfig,
}

/// Feishu application configuration.
///
/// # Invariants
/// - `app_secret` is normally injected via `DITING_FEISHU_APP_SECRET`.
/// - After load, `approval_user_ids` contains `approval_user_id` when the
///   list was empty, and `approval_policy` is `any` or `all`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeishuConfig {
    /// Whether the Feishu channel is enabled.
    #[serde(default)]
    pub enabled: bool,
    /// Application id.
    #[serde(default)]
    pub app_id: String,
    /// Application secret; prefer the environment override.
    #[serde(default)]
    pub app_secret: String,
    /// Single approver id (compatibility field).
    #[serde(default)]
    pub approval_user_id: String,
    /// Approver id list; overrides the single field when non-empty.
    #[serde(default)]
    pub approval_user_ids: Vec<String>,
    /// Default quorum policy, `any` or `all`.
    #[serde(default)]
    pub approval_policy: String,
    /// Receive id kind (`open_id` or `user_id`).
    #[serde(default)]
    pub receive_id_type: String,
    /// Group chat id used as the fallback delivery target.
    #[serde(default)]
    pub chat_id: String,
    /// Base URL used to render approval links, e.g. `http://localhost:8080`.
    #[serde(default)]
    pub gateway_base_url: String,
    /// Send interactive cards instead of text with links.
    #[serde(default)]
    pub use_card_delivery: bool,
    /// Receive card events over the vendor long connection.
    #[serde(default)]
    pub use_long_connection: bool,
    /// Maximum delivery attempts (0 → 3).
    #[serde(default)]
    pub retry_max_attempts: u32,
    /// Initial retry backoff in seconds, doubling per attempt (0 → 1).
    #[serde(default)]
    pub retry_initial_backoff_seconds: u64,
}

/// Audit log path and redaction set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSONL log path; empty is memory-only.
    #[serde(default)]
    pub path: String,
    /// Evidence field names replaced by `***` before serialization.
    #[serde(default)]
    pub redact: Vec<String>,
}

/// Ownership mapping and approval rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipConfig {
    /// Resource → approver ids; `*` is the wildcard entry.
    #[serde(default)]
    pub static_map: BTreeMap<String, Vec<String>>,
    /// Ordered approval rules matched by path prefix and risk level.
    #[serde(default)]
    pub approval_rules: Vec<ApprovalRuleConfig>,
}

/// One configured approval rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRuleConfig {
    /// Path prefix; empty matches all paths.
    #[serde(default)]
    pub path_prefix: String,
    /// Risk level; empty matches all levels.
    #[serde(default)]
    pub risk_level: String,
    /// Timeout in seconds; zero falls back to the default.
    #[serde(default)]
    pub timeout_seconds: u64,
    /// Approver ids; empty falls back to the default list.
    #[serde(default)]
    pub approval_user_ids: Vec<String>,
    /// Quorum policy; anything but `all` normalizes to `any`.
    #[serde(default)]
    pub approval_policy: String,
}

/// Ledger (chain) configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Whether `/chain/*` endpoints and the audit bridge are mounted.
    #[serde(default)]
    pub enabled: bool,
    /// Persistence root (`dids/`, `batches/`, `proofs/`); empty is memory.
    #[serde(default)]
    pub storage_path: String,
    /// Commit audit hashes in batches behind the evidence store.
    #[serde(default)]
    pub audit_batch_enabled: bool,
    /// Batch size threshold (0 → 50).
    #[serde(default)]
    pub audit_batch_size: usize,
    /// Flush interval in seconds (0 → 30).
    #[serde(default)]
    pub audit_batch_interval_sec: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            storage_path: String::new(),
            audit_batch_enabled: false,
            audit_batch_size: 0,
            audit_batch_interval_sec: 0,
        }
    }
}

/// Serde default helper for fields that default to `true`.
const fn default_true() -> bool {
    true
}
