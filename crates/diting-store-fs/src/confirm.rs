// crates/diting-store-fs/src/confirm.rs
// ============================================================================
// Module: JSON Confirmation Store
// Description: One-file-per-object confirmation persistence.
// Purpose: Durably persist CHEQ objects keyed by id.
// Dependencies: diting-core, serde_json
// ============================================================================

//! ## Overview
//! Each confirmation object is stored as `<dir>/<id>.json`; writes replace
//! the whole file under a mutex, so a read always observes one committed
//! version. Ids are engine-generated uuids, never caller-controlled paths.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use diting_core::CheqError;
use diting_core::ConfirmationObject;
use diting_core::ConfirmationStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// File-backed confirmation store, one JSON file per object.
///
/// # Invariants
/// - Writes are whole-file and mutually exclusive.
/// - Ids are sanitized into plain file names; path separators are rejected.
pub struct JsonConfirmationStore {
    /// Storage directory.
    dir: PathBuf,
    /// Write guard; file replacement must not interleave.
    write_lock: Mutex<()>,
}

impl JsonConfirmationStore {
    /// Opens (or creates) the store directory.
    ///
    /// # Errors
    ///
    /// Returns [`CheqError::Store`] when the directory is empty or cannot be
    /// created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CheqError> {
        let dir = dir.into();
        if dir.as_os_str().is_empty() {
            return Err(CheqError::Store("confirmation dir must not be empty".to_string()));
        }
        fs::create_dir_all(&dir)
            .map_err(|err| CheqError::Store(format!("confirmation dir create: {err}")))?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file path backing an object id.
    fn object_path(&self, id: &str) -> Result<PathBuf, CheqError> {
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(CheqError::Store(format!("invalid confirmation id: {id}")));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl ConfirmationStore for JsonConfirmationStore {
    fn put(&self, object: &ConfirmationObject) -> Result<(), CheqError> {
        let path = self.object_path(&object.id)?;
        let data = serde_json::to_vec_pretty(object)
            .map_err(|err| CheqError::Store(format!("confirmation encode: {err}")))?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CheqError::Store("confirmation lock poisoned".to_string()))?;
        fs::write(&path, data)
            .map_err(|err| CheqError::Store(format!("confirmation write: {err}")))
    }

    fn get(&self, id: &str) -> Result<Option<ConfirmationObject>, CheqError> {
        let path = self.object_path(id)?;
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CheqError::Store(format!("confirmation read: {err}"))),
        };
        let object = serde_json::from_slice(&data)
            .map_err(|err| CheqError::Store(format!("confirmation decode: {err}")))?;
        Ok(Some(object))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
