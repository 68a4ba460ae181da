// crates/diting-core/src/cheq/memory.rs
// ============================================================================
// Module: In-Memory Confirmation Store
// Description: Map-backed ConfirmationStore for tests and memory-only runs.
// Purpose: Provide store semantics without filesystem state.
// Dependencies: crate::core, crate::interfaces
// ============================================================================

//! ## Overview
//! A mutex-guarded map with whole-record replacement, matching the semantics
//! the engine requires from durable stores: exclusive writes, last committed
//! version visible to reads, objects handed out by value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::core::confirmation::ConfirmationObject;
use crate::interfaces::CheqError;
use crate::interfaces::ConfirmationStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// In-memory confirmation store.
///
/// # Invariants
/// - Writes replace whole records under the mutex.
#[derive(Debug, Default)]
pub struct InMemoryConfirmationStore {
    /// Objects keyed by id.
    objects: Mutex<BTreeMap<String, ConfirmationObject>>,
}

impl InMemoryConfirmationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfirmationStore for InMemoryConfirmationStore {
    fn put(&self, object: &ConfirmationObject) -> Result<(), CheqError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| CheqError::Store("confirmation lock poisoned".to_string()))?;
        objects.insert(object.id.clone(), object.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<ConfirmationObject>, CheqError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| CheqError::Store("confirmation lock poisoned".to_string()))?;
        Ok(objects.get(id).cloned())
    }
}
