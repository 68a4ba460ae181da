// crates/diting-core/src/policy/rules.rs
// ============================================================================
// Module: Policy Rule File
// Description: Rule file format and loader.
// Purpose: Parse the ordered YAML ruleset backing the policy engine.
// Dependencies: serde, serde_yaml
// ============================================================================

//! ## Overview
//! Rules live in a YAML file with a single `rules:` list. Empty patterns and
//! `*` are wildcards; declaration order is evaluation order. A missing rules
//! file is an empty ruleset (default deny), not an error, so a gateway can
//! boot before its policy is authored.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

use crate::core::decision::DecisionKind;
use crate::interfaces::PolicyError;

// ============================================================================
// SECTION: Rule Model
// ============================================================================

/// Verdict a rule assigns when it matches.
///
/// # Invariants
/// - Values map 1:1 onto [`DecisionKind`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleDecision {
    /// Permit the action.
    Allow,
    /// Refuse the action.
    Deny,
    /// Suspend for human confirmation.
    Review,
}

impl RuleDecision {
    /// Returns the stable label used in synthesized reasons and rule ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
            Self::Review => "review",
        }
    }

    /// Returns the decision kind this rule verdict produces.
    #[must_use]
    pub const fn kind(self) -> DecisionKind {
        match self {
            Self::Allow => DecisionKind::Allow,
            Self::Deny => DecisionKind::Deny,
            Self::Review => DecisionKind::Review,
        }
    }
}

/// One ordered policy rule.
///
/// # Invariants
/// - Empty or `*` patterns match any value.
/// - Earlier rules win; the engine never reorders the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    /// Rule identifier recorded in the audit trail.
    #[serde(default)]
    pub id: String,
    /// Subject pattern (agent identity).
    #[serde(default)]
    pub subject: String,
    /// Action pattern.
    #[serde(default)]
    pub action: String,
    /// Resource pattern.
    #[serde(default)]
    pub resource: String,
    /// Verdict assigned on match.
    pub decision: RuleDecision,
    /// Optional reason; synthesized as `<decision> by rule <id>` when empty.
    #[serde(default)]
    pub reason: String,
}

impl PolicyRule {
    /// Returns whether the rule matches the normalized triple.
    #[must_use]
    pub fn matches(&self, subject: &str, action: &str, resource: &str) -> bool {
        pattern_matches(&self.subject, subject)
            && pattern_matches(&self.action, action)
            && pattern_matches(&self.resource, resource)
    }
}

/// Returns whether a rule pattern matches a value (empty and `*` are wild).
fn pattern_matches(pattern: &str, value: &str) -> bool {
    pattern.is_empty() || pattern == "*" || pattern == value
}

// ============================================================================
// SECTION: Rule File
// ============================================================================

/// Root structure of the rules file.
#[derive(Debug, Default, Deserialize)]
struct RulesFile {
    /// Ordered rule list.
    #[serde(default)]
    rules: Vec<PolicyRule>,
}

/// Loads the ordered ruleset from a YAML file.
///
/// A missing file yields an empty ruleset; an empty path yields an empty
/// ruleset without touching the filesystem.
///
/// # Errors
///
/// Returns [`PolicyError::Load`] when the file cannot be read (other than
/// not existing) or fails to parse.
pub fn load_rules(path: &Path) -> Result<Vec<PolicyRule>, PolicyError> {
    if path.as_os_str().is_empty() {
        return Ok(Vec::new());
    }
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(PolicyError::Load(format!("policy rules read: {err}"))),
    };
    let file: RulesFile = serde_yaml::from_str(&data)
        .map_err(|err| PolicyError::Load(format!("policy rules unmarshal: {err}")))?;
    Ok(file.rules)
}
