// crates/diting-store-fs/src/jsonl.rs
// ============================================================================
// Module: JSONL Evidence Store
// Description: Append-only evidence log with configurable redaction.
// Purpose: Provide the durable audit trail behind the decision pipeline.
// Dependencies: diting-core, serde_json
// ============================================================================

//! ## Overview
//! Each append serializes one evidence record to a single JSON line. When a
//! redaction set is configured, the named fields are replaced by `***` on a
//! copy before serialization; the caller's record is never mutated. Queries
//! re-read the whole file and filter by trace id — a linear scan, bounded by
//! the lifetime of the trace under inspection.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use diting_core::AuditError;
use diting_core::Evidence;
use diting_core::EvidenceStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Append-only JSONL evidence store.
///
/// # Invariants
/// - Appends are serialized under a single mutex and flushed to disk before
///   the lock is released.
/// - Redaction operates on copies; in-memory records stay intact.
pub struct JsonlEvidenceStore {
    /// Log file path, re-opened for queries.
    path: PathBuf,
    /// Field names replaced by `***` before serialization.
    redact: Vec<String>,
    /// Append handle guarded for exclusive writes.
    file: Mutex<File>,
}

impl JsonlEvidenceStore {
    /// Opens (or creates) the evidence log at `path`.
    ///
    /// Parent directories are created as needed.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Io`] when the path is empty or the file cannot
    /// be opened for appending.
    pub fn open(path: impl Into<PathBuf>, redact: Vec<String>) -> Result<Self, AuditError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(AuditError::Io("audit path must not be empty".to_string()));
        }
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| AuditError::Io(format!("audit dir create: {err}")))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| AuditError::Io(format!("audit open: {err}")))?;
        Ok(Self {
            path,
            redact,
            file: Mutex::new(file),
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EvidenceStore for JsonlEvidenceStore {
    fn append(&self, evidence: &Evidence) -> Result<(), AuditError> {
        let to_write =
            if self.redact.is_empty() { evidence.clone() } else { evidence.redacted(&self.redact) };
        let mut line = serde_json::to_vec(&to_write)
            .map_err(|err| AuditError::Serialize(err.to_string()))?;
        line.push(b'\n');

        let mut file =
            self.file.lock().map_err(|_| AuditError::Io("audit lock poisoned".to_string()))?;
        file.write_all(&line).map_err(|err| AuditError::Io(format!("audit write: {err}")))?;
        file.sync_data().map_err(|err| AuditError::Io(format!("audit sync: {err}")))?;
        Ok(())
    }

    fn query_by_trace_id(&self, trace_id: &str) -> Result<Vec<Evidence>, AuditError> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AuditError::Io(format!("audit read: {err}"))),
        };
        let mut out = Vec::new();
        for line in data.lines() {
            if line.is_empty() {
                continue;
            }
            // Lines that fail to parse are skipped rather than failing the
            // whole query; a torn trailing line must not hide earlier records.
            let Ok(record) = serde_json::from_str::<Evidence>(line) else {
                continue;
            };
            if record.trace_id == trace_id {
                out.push(record);
            }
        }
        Ok(out)
    }
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

    use diting_core::EvidenceDecision;

    use super::*;

    fn evidence(trace_id: &str, decision: EvidenceDecision) -> Evidence {
        Evidence {
            trace_id: trace_id.to_string(),
            span_id: None,
            agent_id: "agent-1".to_string(),
            policy_rule_id: "r1".to_string(),
            decision_reason: "matched".to_string(),
            decision,
            cheq_status: String::new(),
            confirmer: String::new(),
            timestamp: time::OffsetDateTime::now_utc(),
            resource: "/api".to_string(),
            action: "GET".to_string(),
        }
    }

    #[test]
    fn append_and_query_by_trace_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlEvidenceStore::open(dir.path().join("audit.jsonl"), Vec::new()).unwrap();

        store.append(&evidence("t1", EvidenceDecision::Allow)).unwrap();
        store.append(&evidence("t2", EvidenceDecision::Deny)).unwrap();
        store.append(&evidence("t1", EvidenceDecision::Approved)).unwrap();

        let records = store.query_by_trace_id("t1").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].decision, EvidenceDecision::Allow);
        assert_eq!(records[1].decision, EvidenceDecision::Approved);
        assert!(store.query_by_trace_id("t3").unwrap().is_empty());
    }

    #[test]
    fn redaction_masks_serialized_copy_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlEvidenceStore::open(
            dir.path().join("audit.jsonl"),
            vec!["agent_id".to_string(), "decision_reason".to_string()],
        )
        .unwrap();

        let record = evidence("t1", EvidenceDecision::Allow);
        store.append(&record).unwrap();
        // The caller's record is untouched.
        assert_eq!(record.agent_id, "agent-1");

        let stored = store.query_by_trace_id("t1").unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].agent_id, "***");
        assert_eq!(stored[0].decision_reason, "***");
        assert_eq!(stored[0].policy_rule_id, "r1");
    }

    #[test]
    fn redacted_trace_id_is_unqueryable_by_original_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlEvidenceStore::open(
            dir.path().join("audit.jsonl"),
            vec!["trace_id".to_string()],
        )
        .unwrap();
        store.append(&evidence("t1", EvidenceDecision::Allow)).unwrap();
        assert!(store.query_by_trace_id("t1").unwrap().is_empty());
        assert_eq!(store.query_by_trace_id("***").unwrap().len(), 1);
    }

    #[test]
    fn unparseable_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let store = JsonlEvidenceStore::open(&path, Vec::new()).unwrap();
        store.append(&evidence("t1", EvidenceDecision::Allow)).unwrap();
        std::fs::write(&path, {
            let mut data = std::fs::read(&path).unwrap();
            data.extend_from_slice(b"{torn line\n");
            data
        })
        .unwrap();
        assert_eq!(store.query_by_trace_id("t1").unwrap().len(), 1);
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(JsonlEvidenceStore::open(PathBuf::new(), Vec::new()).is_err());
    }
}
