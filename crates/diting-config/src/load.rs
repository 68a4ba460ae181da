// crates/diting-config/src/load.rs
// ============================================================================
// Module: Configuration Loading
// Description: YAML load, env-file parsing, overrides, and validation.
// Purpose: Produce one normalized configuration tree per process.
// Dependencies: serde_yaml, crate::model
// ============================================================================

//! ## Overview
//! Load order: parse the YAML file, apply `DITING_*` overrides (an optional
//! `.env`-style file takes precedence over the process environment), then
//! normalize (single approver id into the list, approval policy to
//! `any`/`all`) and validate. A failed load never yields a partial tree.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;

use crate::model::Config;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config load: {0}")]
    Read(String),
    /// Config file could not be parsed.
    #[error("config unmarshal: {0}")]
    Parse(String),
    /// Config failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Env File
// ============================================================================

/// Parses a `.env`-style file into a key → value map.
///
/// Blank lines and `#` comments are ignored; surrounding double quotes on
/// values are stripped. A missing file yields an empty map.
///
/// # Errors
///
/// Returns [`ConfigError::Read`] when the file exists but cannot be read.
pub fn load_env_file(path: &Path) -> Result<BTreeMap<String, String>, ConfigError> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(ConfigError::Read(format!("env file: {err}"))),
    };
    let mut vars = BTreeMap::new();
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let mut value = value.trim();
        if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
            value = &value[1..value.len() - 1];
        }
        vars.insert(key.to_string(), value.to_string());
    }
    Ok(vars)
}

// ============================================================================
// SECTION: Load
// ============================================================================

/// Loads, overrides, normalizes, and validates the configuration.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or when
/// validation fails.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    load_with_env(path, &BTreeMap::new())
}

/// [`load`] with an explicit env-file map taking precedence over the process
/// environment.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read or parsed, or when
/// validation fails.
pub fn load_with_env(
    path: &Path,
    env_file: &BTreeMap<String, String>,
) -> Result<Config, ConfigError> {
    let data =
        fs::read_to_string(path).map_err(|err| ConfigError::Read(format!("{err}")))?;
    let mut config: Config =
        serde_yaml::from_str(&data).map_err(|err| ConfigError::Parse(format!("{err}")))?;
    apply_overrides(&mut config, &|key| {
        env_file.get(key).cloned().or_else(|| env::var(key).ok())
    });
    normalize(&mut config);
    validate(&config)?;
    Ok(config)
}

/// Applies `DITING_*` overrides from the given lookup.
fn apply_overrides(config: &mut Config, lookup: &dyn Fn(&str) -> Option<String>) {
    let set_string = |target: &mut String, key: &str| {
        if let Some(value) = lookup(key)
            && !value.is_empty()
        {
            *target = value;
        }
    };
    set_string(&mut config.delivery.feishu.app_id, "DITING_FEISHU_APP_ID");
    set_string(&mut config.delivery.feishu.app_secret, "DITING_FEISHU_APP_SECRET");
    set_string(&mut config.delivery.feishu.approval_user_id, "DITING_FEISHU_APPROVAL_USER_ID");
    set_string(&mut config.delivery.feishu.chat_id, "DITING_FEISHU_CHAT_ID");
    set_string(&mut config.delivery.feishu.receive_id_type, "DITING_FEISHU_RECEIVE_ID_TYPE");
    set_string(&mut config.delivery.feishu.gateway_base_url, "DITING_GATEWAY_BASE_URL");
    set_string(&mut config.proxy.listen_addr, "DITING_PROXY_LISTEN");

    if let Some(value) = lookup("DITING_FEISHU_USE_CARD_DELIVERY") {
        config.delivery.feishu.use_card_delivery = is_truthy(&value);
    }
    if let Some(value) = lookup("DITING_FEISHU_USE_LONG_CONNECTION") {
        config.delivery.feishu.use_long_connection = is_truthy(&value);
    }
    if let Some(value) = lookup("DITING_CHEQ_TIMEOUT_SECONDS")
        && let Ok(parsed) = value.parse()
    {
        config.cheq.timeout_seconds = parsed;
    }
    if let Some(value) = lookup("DITING_CHEQ_REMINDER_SECONDS_BEFORE_TIMEOUT")
        && let Ok(parsed) = value.parse()
    {
        config.cheq.reminder_seconds_before_timeout = parsed;
    }
    if let Some(value) = lookup("DITING_FEISHU_RETRY_MAX_ATTEMPTS")
        && let Ok(parsed) = value.parse()
    {
        config.delivery.feishu.retry_max_attempts = parsed;
    }
    if let Some(value) = lookup("DITING_FEISHU_RETRY_INITIAL_BACKOFF_SECONDS")
        && let Ok(parsed) = value.parse()
    {
        config.delivery.feishu.retry_initial_backoff_seconds = parsed;
    }
}

/// Returns whether an override value reads as true.
fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "true" | "1")
}

/// Applies post-load normalization.
fn normalize(config: &mut Config) {
    let feishu = &mut config.delivery.feishu;
    if feishu.approval_user_ids.is_empty() && !feishu.approval_user_id.is_empty() {
        feishu.approval_user_ids = vec![feishu.approval_user_id.clone()];
    }
    if feishu.approval_policy != "all" {
        feishu.approval_policy = "any".to_string();
    }
    for rule in &mut config.ownership.approval_rules {
        if rule.approval_policy != "all" {
            rule.approval_policy = "any".to_string();
        }
    }
}

/// Validates the normalized tree.
fn validate(config: &Config) -> Result<(), ConfigError> {
    if !config.proxy.listen_addr.is_empty() {
        let addr = config.proxy.listen_addr.as_str();
        // `:8080` means "all interfaces"; prefix the wildcard host to parse.
        let candidate =
            if addr.starts_with(':') { format!("0.0.0.0{addr}") } else { addr.to_string() };
        candidate
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid(format!("listen_addr unparseable: {addr}")))?;
    }
    if config.chain.enabled && config.chain.audit_batch_enabled {
        // Zero means "use default"; only explicit nonsense is rejected here.
        if config.chain.audit_batch_size > 10_000 {
            return Err(ConfigError::Invalid(
                "audit_batch_size exceeds the 10000 record ceiling".to_string(),
            ));
        }
    }
    if config.delivery.feishu.enabled
        && config.delivery.feishu.app_id.is_empty() != config.delivery.feishu.app_secret.is_empty()
    {
        return Err(ConfigError::Invalid(
            "feishu app_id and app_secret must be configured together".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions."
    )]

    use super::*;

    fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn minimal_yaml_loads_with_defaults() {
        let (_dir, path) = write_config("proxy:\n  listen_addr: \":8080\"\n");
        let config = load(&path).unwrap();
        assert_eq!(config.proxy.listen_addr, ":8080");
        assert!(config.cheq.review_requires_approval);
        assert_eq!(config.delivery.feishu.approval_policy, "any");
        assert!(!config.chain.enabled);
    }

    #[test]
    fn env_file_values_override_yaml() {
        let (_dir, path) = write_config(
            "proxy:\n  listen_addr: \":8080\"\ncheq:\n  timeout_seconds: 300\n",
        );
        let mut env_file = BTreeMap::new();
        env_file.insert("DITING_CHEQ_TIMEOUT_SECONDS".to_string(), "60".to_string());
        env_file.insert("DITING_PROXY_LISTEN".to_string(), ":9090".to_string());
        env_file.insert("DITING_FEISHU_USE_CARD_DELIVERY".to_string(), "1".to_string());
        let config = load_with_env(&path, &env_file).unwrap();
        assert_eq!(config.cheq.timeout_seconds, 60);
        assert_eq!(config.proxy.listen_addr, ":9090");
        assert!(config.delivery.feishu.use_card_delivery);
    }

    #[test]
    fn single_approver_feeds_the_list() {
        let (_dir, path) = write_config(
            "delivery:\n  feishu:\n    approval_user_id: ou_1\n    approval_policy: all\n",
        );
        let config = load(&path).unwrap();
        assert_eq!(config.delivery.feishu.approval_user_ids, vec!["ou_1"]);
        assert_eq!(config.delivery.feishu.approval_policy, "all");
    }

    #[test]
    fn unknown_approval_policy_normalizes_to_any() {
        let (_dir, path) = write_config(
            "ownership:\n  approval_rules:\n    - path_prefix: /api\n      approval_policy: quorum\n",
        );
        let config = load(&path).unwrap();
        assert_eq!(config.ownership.approval_rules[0].approval_policy, "any");
    }

    #[test]
    fn bad_listen_addr_fails_validation() {
        let (_dir, path) = write_config("proxy:\n  listen_addr: \"not an addr\"\n");
        assert!(matches!(load(&path).unwrap_err(), ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_config_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read(_)));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let (_dir, path) = write_config("proxy: [");
        assert!(matches!(load(&path).unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn env_file_parsing_handles_comments_and_quotes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "# comment\n\nDITING_FEISHU_APP_ID=cli_x\nDITING_FEISHU_APP_SECRET=\"s3cr3t\"\nBROKEN LINE\n")
            .unwrap();
        let vars = load_env_file(&path).unwrap();
        assert_eq!(vars.get("DITING_FEISHU_APP_ID").map(String::as_str), Some("cli_x"));
        assert_eq!(vars.get("DITING_FEISHU_APP_SECRET").map(String::as_str), Some("s3cr3t"));
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_env_file(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn half_configured_feishu_credentials_fail_validation() {
        let (_dir, path) =
            write_config("delivery:\n  feishu:\n    enabled: true\n    app_id: cli_x\n");
        assert!(matches!(load(&path).unwrap_err(), ConfigError::Invalid(_)));
    }
}
