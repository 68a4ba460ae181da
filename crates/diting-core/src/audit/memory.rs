// crates/diting-core/src/audit/memory.rs
// ============================================================================
// Module: In-Memory Evidence Store
// Description: Vec-backed append-only EvidenceStore.
// Purpose: Provide audit semantics without filesystem state.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! Appends clone the record under a mutex; queries filter by trace id in
//! append order, matching the guarantees of the durable store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;

use crate::core::evidence::Evidence;
use crate::interfaces::AuditError;
use crate::interfaces::EvidenceStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory evidence store.
///
/// # Invariants
/// - Records are append-only and returned in append order.
#[derive(Debug, Default)]
pub struct InMemoryEvidenceStore {
    /// Appended records in order.
    records: Mutex<Vec<Evidence>>,
}

impl InMemoryEvidenceStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every appended record, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the store lock is poisoned.
    pub fn all(&self) -> Result<Vec<Evidence>, AuditError> {
        let records =
            self.records.lock().map_err(|_| AuditError::Io("audit lock poisoned".to_string()))?;
        Ok(records.clone())
    }
}

impl EvidenceStore for InMemoryEvidenceStore {
    fn append(&self, evidence: &Evidence) -> Result<(), AuditError> {
        let mut records =
            self.records.lock().map_err(|_| AuditError::Io("audit lock poisoned".to_string()))?;
        records.push(evidence.clone());
        Ok(())
    }

    fn query_by_trace_id(&self, trace_id: &str) -> Result<Vec<Evidence>, AuditError> {
        let records =
            self.records.lock().map_err(|_| AuditError::Io("audit lock poisoned".to_string()))?;
        Ok(records.iter().filter(|record| record.trace_id == trace_id).cloned().collect())
    }
}
