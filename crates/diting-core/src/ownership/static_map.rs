// crates/diting-core/src/ownership/static_map.rs
// ============================================================================
// Module: Static Ownership Resolver
// Description: Map-backed resource-to-approver resolution.
// Purpose: Resolve confirmation fan-out targets from static configuration.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Lookup order is exact resource, then the `*` wildcard entry, then the
//! configured default approver list. The resolver hands out copies so callers
//! can freely edit the returned list.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::interfaces::OwnershipResolver;

// ============================================================================
// SECTION: Static Resolver
// ============================================================================

/// Static map resolver: `resource -> approver ids` with wildcard and default.
///
/// # Invariants
/// - The map and default list are fixed after construction.
/// - Results are defensive copies.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    /// Resource to approver identifiers; `*` is the wildcard entry.
    map: BTreeMap<String, Vec<String>>,
    /// Fallback approver identifiers when no entry matches.
    default_ids: Vec<String>,
}

impl StaticResolver {
    /// Creates a resolver from a static map and a default approver list.
    #[must_use]
    pub fn new(map: BTreeMap<String, Vec<String>>, default_ids: Vec<String>) -> Self {
        Self {
            map,
            default_ids,
        }
    }
}

impl OwnershipResolver for StaticResolver {
    fn resolve(&self, resource: &str, _action: &str) -> Vec<String> {
        if let Some(ids) = self.map.get(resource)
            && !ids.is_empty()
        {
            return ids.clone();
        }
        if let Some(ids) = self.map.get("*")
            && !ids.is_empty()
        {
            return ids.clone();
        }
        self.default_ids.clone()
    }
}
