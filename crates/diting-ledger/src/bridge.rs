// crates/diting-ledger/src/bridge.rs
// ============================================================================
// Module: Audit → Ledger Bridge
// Description: Evidence store wrapper with batched hash commitment.
// Purpose: Attest audit records on the ledger without blocking the pipeline.
// Dependencies: diting-core, sha2, hex, tokio
// ============================================================================

//! ## Overview
//! The bridge wraps an [`EvidenceStore`]: appends go to the inner store first
//! and must succeed; on success the record's SHA-256 is enqueued on a bounded
//! channel without blocking (a full channel drops the hash — the ledger is a
//! secondary attestation, the evidence log owns durability). A background
//! worker drains the channel into a `trace_id → hash` map and flushes a batch
//! whenever the map reaches the batch size or the interval timer fires. Flush
//! failures drop the batch after logging; individual hashes are never
//! retried.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use diting_core::AuditError;
use diting_core::Evidence;
use diting_core::EvidenceStore;
use sha2::Digest;
use sha2::Sha256;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::compact_utc_stamp;
use crate::ledger::Ledger;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Bound of the append → worker hash channel.
const CHANNEL_CAPACITY: usize = 500;
/// Default flush threshold.
const DEFAULT_BATCH_SIZE: usize = 50;
/// Default flush interval.
const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);
/// Deadline for one ledger batch submission.
const FLUSH_DEADLINE: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Bridge tuning knobs.
///
/// # Invariants
/// - Zero values fall back to the defaults (50 records / 30 seconds).
#[derive(Debug, Clone, Copy)]
pub struct BridgeConfig {
    /// Flush once the pending map reaches this size.
    pub batch_size: usize,
    /// Flush at least this often.
    pub interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            interval: DEFAULT_INTERVAL,
        }
    }
}

// ============================================================================
// SECTION: Bridge
// ============================================================================

/// One enqueued evidence hash.
struct TraceHash {
    /// Trace identifier.
    trace_id: String,
    /// Hex-encoded SHA-256 of the serialized record.
    hash: String,
}

/// Evidence store wrapper committing hashes to the ledger in batches.
///
/// # Invariants
/// - The inner append must succeed before a hash is enqueued.
/// - Enqueueing never blocks; a full channel drops the hash silently.
pub struct AuditLedgerBridge {
    /// Wrapped evidence store; owns audit durability.
    inner: Arc<dyn EvidenceStore>,
    /// Hash channel to the flush worker; `None` after shutdown.
    sender: Mutex<Option<mpsc::Sender<TraceHash>>>,
    /// Flush worker handle, joined on shutdown.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AuditLedgerBridge {
    /// Creates the bridge and spawns its flush worker.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(inner: Arc<dyn EvidenceStore>, ledger: Arc<dyn Ledger>, config: BridgeConfig) -> Self {
        let batch_size = if config.batch_size == 0 { DEFAULT_BATCH_SIZE } else { config.batch_size };
        let interval =
            if config.interval.is_zero() { DEFAULT_INTERVAL } else { config.interval };
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let worker = tokio::spawn(flush_loop(receiver, ledger, batch_size, interval));
        Self {
            inner,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Stops the worker after one final flush of pending hashes.
    pub async fn shutdown(&self) {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        drop(sender);
        let worker = match self.worker.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(worker) = worker
            && let Err(err) = worker.await
        {
            tracing::warn!(error = %err, "bridge worker join failed");
        }
    }
}

impl EvidenceStore for AuditLedgerBridge {
    fn append(&self, evidence: &Evidence) -> Result<(), AuditError> {
        self.inner.append(evidence)?;
        if evidence.trace_id.is_empty() {
            return Ok(());
        }
        let Ok(serialized) = serde_json::to_vec(evidence) else {
            return Ok(());
        };
        let hash = hex::encode(Sha256::digest(&serialized));
        if let Ok(guard) = self.sender.lock()
            && let Some(sender) = guard.as_ref()
        {
            // Full channel: drop rather than block; the evidence log already
            // holds the durable record.
            let _ = sender.try_send(TraceHash {
                trace_id: evidence.trace_id.clone(),
                hash,
            });
        }
        Ok(())
    }

    fn query_by_trace_id(&self, trace_id: &str) -> Result<Vec<Evidence>, AuditError> {
        self.inner.query_by_trace_id(trace_id)
    }
}

// ============================================================================
// SECTION: Flush Worker
// ============================================================================

/// Drains the hash channel, flushing on size or interval.
async fn flush_loop(
    mut receiver: mpsc::Receiver<TraceHash>,
    ledger: Arc<dyn Ledger>,
    batch_size: usize,
    interval: Duration,
) {
    let mut pending: BTreeMap<String, String> = BTreeMap::new();
    let start = tokio::time::Instant::now() + interval;
    let mut tick = tokio::time::interval_at(start, interval);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            received = receiver.recv() => match received {
                Some(trace_hash) => {
                    pending.insert(trace_hash.trace_id, trace_hash.hash);
                    if pending.len() >= batch_size {
                        flush(&ledger, &mut pending).await;
                    }
                }
                None => {
                    flush(&ledger, &mut pending).await;
                    return;
                }
            },
            _ = tick.tick() => {
                flush(&ledger, &mut pending).await;
            }
        }
    }
}

/// Commits the pending map as one batch; failures drop the batch.
async fn flush(ledger: &Arc<dyn Ledger>, pending: &mut BTreeMap<String, String>) {
    if pending.is_empty() {
        return;
    }
    let batch_id = format!("audit-{}", compact_utc_stamp(time::OffsetDateTime::now_utc()));
    let result =
        tokio::time::timeout(FLUSH_DEADLINE, ledger.append_batch(&batch_id, pending)).await;
    match result {
        Ok(Ok(root)) => {
            tracing::debug!(batch_id, root, leaves = pending.len(), "audit batch committed");
        }
        Ok(Err(err)) => {
            tracing::warn!(batch_id, error = %err, "audit batch failed; dropping batch");
        }
        Err(_) => {
            tracing::warn!(batch_id, "audit batch timed out; dropping batch");
        }
    }
    pending.clear();
}
