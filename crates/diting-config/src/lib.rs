// crates/diting-config/src/lib.rs
// ============================================================================
// Module: Diting Configuration
// Description: YAML configuration model, env-file loading, and overrides.
// Purpose: Provide one validated configuration tree for every entry point.
// Dependencies: serde, serde_yaml
// ============================================================================

//! ## Overview
//! Configuration is a YAML file mirroring the gateway's component layout
//! (`proxy`, `policy`, `cheq`, `delivery`, `audit`, `ownership`, `chain`).
//! Sensitive and deployment-specific values are overridden by `DITING_*`
//! environment variables, optionally sourced from a `.env`-style file that
//! takes precedence over the process environment. Validation happens once at
//! load; the resulting tree is immutable.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod load;
mod model;

pub use load::ConfigError;
pub use load::load;
pub use load::load_env_file;
pub use load::load_with_env;
pub use model::ApprovalRuleConfig;
pub use model::AuditConfig;
pub use model::ChainConfig;
pub use model::CheqConfig;
pub use model::Config;
pub use model::DeliveryConfig;
pub use model::FeishuConfig;
pub use model::OwnershipConfig;
pub use model::PolicyConfig;
pub use model::ProxyConfig;
