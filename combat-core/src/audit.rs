//! # audit
//!
//! SHA-256 chained, append-only audit log (§4.10). Every accepted or
//! rejected event, harmonized-event emission, round verdict, manual
//! edit, and scoring fault is appended as a record where each record
//! hashes the previous record's hash, scoped to the bout it belongs to.
//! Tampering with any record breaks that bout's chain.
//!
//! Direct adaptation of the teacher's `AuditBlock`/`AuditLogger` shape,
//! generalised from one global session chain to one chain per bout and
//! from a single `/data/audit.jsonl` to a per-bout NDJSON mirror file.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use combat_types::{Actor, AuditEventKind, AuditMetadata, AuditRecord, GENESIS_HASH};

use crate::error::AuditError;

fn compute_hash(prev_hash: &str, seq: u64, kind: &AuditEventKind, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(seq.to_le_bytes());
    hasher.update(serde_json::to_string(kind).unwrap_or_default().as_bytes());
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Recomputes a record's hash and compares it to the stored one.
pub fn verify_record(record: &AuditRecord) -> bool {
    compute_hash(&record.prev_hash, record.seq, &record.kind, &record.payload) == record.hash
}

/// Recomputes a whole bout's chain from the first record, checking
/// each record's `prev_hash` against the previous record's `hash` and
/// each record's own `hash` against its contents. Returns the first
/// broken link, if any.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), AuditError> {
    let mut expected_prev = GENESIS_HASH.to_string();
    for record in records {
        if record.prev_hash != expected_prev {
            return Err(AuditError::ChainBroken {
                bout_id: record.bout_id.clone(),
                seq: record.seq,
                expected: expected_prev,
                found: record.prev_hash.clone(),
            });
        }
        if !verify_record(record) {
            return Err(AuditError::ChainBroken {
                bout_id: record.bout_id.clone(),
                seq: record.seq,
                expected: compute_hash(&record.prev_hash, record.seq, &record.kind, &record.payload),
                found: record.hash.clone(),
            });
        }
        expected_prev = record.hash.clone();
    }
    Ok(())
}

#[derive(Default)]
struct ChainState {
    seq: u64,
    last_hash: String,
}

impl ChainState {
    fn genesis() -> Self {
        Self { seq: 1, last_hash: GENESIS_HASH.to_string() }
    }
}

/// Thread-safe, append-only SHA-256 chained audit logger, one chain
/// per bout. Hash-chaining happens synchronously in `append`, so the
/// record order within a bout's chain is never ambiguous; the actual
/// NDJSON write doesn't block the caller — each completed record is
/// handed to the mirror-writer task over an unbounded channel (§4.14),
/// which persists it to `{data_dir}/audit/{bout_id}.ndjson`. Write
/// failures are logged but never fatal (§4.10, §7).
#[derive(Clone)]
pub struct AuditLogger {
    chains: Arc<RwLock<HashMap<String, ChainState>>>,
    mirror_tx: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditLogger {
    /// Returns the logger and the receiving half of the mirror
    /// channel; the caller spawns `run_mirror_writer` on it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditRecord>) {
        let (mirror_tx, mirror_rx) = mpsc::unbounded_channel();
        (Self { chains: Arc::new(RwLock::new(HashMap::new())), mirror_tx }, mirror_rx)
    }

    /// Appends one record to `bout_id`'s chain and returns the
    /// completed, hash-stamped record.
    pub async fn append(
        &self,
        bout_id: &str,
        kind: AuditEventKind,
        payload: Value,
        actor: Actor,
        metadata: AuditMetadata,
        ts_ms: i64,
    ) -> AuditRecord {
        let record = {
            let mut chains = self.chains.write().await;
            let state = chains.entry(bout_id.to_string()).or_insert_with(ChainState::genesis);
            let hash = compute_hash(&state.last_hash, state.seq, &kind, &payload);
            let record = AuditRecord {
                bout_id: bout_id.to_string(),
                seq: state.seq,
                prev_hash: state.last_hash.clone(),
                kind,
                payload,
                actor,
                metadata,
                ts_ms,
                hash: hash.clone(),
            };
            state.last_hash = hash;
            state.seq += 1;
            record
        };

        debug_assert!(verify_record(&record), "audit record hash mismatch immediately after creation");
        if self.mirror_tx.send(record.clone()).is_err() {
            warn!(bout_id = %record.bout_id, "audit: mirror writer task is gone, record not persisted");
        }
        record
    }

    /// Convenience wrapper for the scoring pipeline: records an
    /// accepted/rejected ingest decision.
    pub async fn log_event_decision(&self, bout_id: &str, accepted: bool, event_id: &str, ts_ms: i64) -> AuditRecord {
        let kind = if accepted { AuditEventKind::EventAccepted } else { AuditEventKind::EventRejected };
        self.append(
            bout_id,
            kind,
            serde_json::json!({ "event_id": event_id }),
            Actor::System,
            AuditMetadata::default(),
            ts_ms,
        )
        .await
    }

    /// Convenience wrapper: records a computed round verdict.
    pub async fn log_round_verdict(&self, bout_id: &str, verdict: &combat_types::RoundVerdict, ts_ms: i64) -> AuditRecord {
        self.append(
            bout_id,
            AuditEventKind::RoundVerdictComputed,
            serde_json::to_value(verdict).unwrap_or(Value::Null),
            Actor::ScoringEngine,
            AuditMetadata::default(),
            ts_ms,
        )
        .await
    }
}

fn mirror_path(data_dir: &str, bout_id: &str) -> std::path::PathBuf {
    std::path::Path::new(data_dir).join("audit").join(format!("{bout_id}.ndjson"))
}

/// Drains the mirror channel and persists each record as one NDJSON
/// line under `{data_dir}/audit/{bout_id}.ndjson`. Runs until every
/// `AuditLogger` clone (and its sender) is dropped. Spawned once by
/// the composition root (§4.14).
pub async fn run_mirror_writer(data_dir: String, mut rx: mpsc::UnboundedReceiver<AuditRecord>) {
    while let Some(record) = rx.recv().await {
        let line = match serde_json::to_string(&record) {
            Ok(l) => format!("{l}\n"),
            Err(e) => {
                warn!(bout_id = %record.bout_id, "audit: failed to serialize record: {e}");
                continue;
            }
        };

        let path = mirror_path(&data_dir, &record.bout_id);
        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(bout_id = %record.bout_id, "audit: could not create mirror directory: {e}");
            }
        }

        match OpenOptions::new().create(true).append(true).open(&path).await {
            Ok(mut f) => {
                if let Err(e) = f.write_all(line.as_bytes()).await {
                    warn!(bout_id = %record.bout_id, "audit: mirror write failed: {e}");
                }
            }
            Err(e) => {
                info!(bout_id = %record.bout_id, seq = record.seq, hash = %record.hash, "audit record (mirror unavailable)");
                warn!(bout_id = %record.bout_id, path = %path.display(), "audit: could not open mirror file: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn genesis_record_chains_from_the_genesis_hash() {
        let (logger, _rx) = AuditLogger::new();
        let record = logger
            .log_event_decision("bout-1", true, "evt-1", 1_000)
            .await;
        assert_eq!(record.prev_hash, GENESIS_HASH);
        assert_eq!(record.seq, 1);
        assert!(verify_record(&record));
    }

    #[tokio::test]
    async fn successive_records_chain_by_hash_and_verify() {
        let (logger, _rx) = AuditLogger::new();
        let first = logger.log_event_decision("bout-2", true, "evt-1", 1_000).await;
        let second = logger.log_event_decision("bout-2", false, "evt-2", 1_010).await;
        assert_eq!(second.prev_hash, first.hash);
        assert_eq!(second.seq, 2);
        assert!(verify_chain(&[first, second]).is_ok());
    }

    #[tokio::test]
    async fn chains_are_independent_per_bout() {
        let (logger, _rx) = AuditLogger::new();
        let a = logger.log_event_decision("bout-a", true, "evt-1", 0).await;
        let b = logger.log_event_decision("bout-b", true, "evt-1", 0).await;
        assert_eq!(a.prev_hash, GENESIS_HASH);
        assert_eq!(b.prev_hash, GENESIS_HASH);
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 1);
    }

    #[test]
    fn tampered_payload_breaks_verification() {
        let mut record = AuditRecord {
            bout_id: "bout-1".into(),
            seq: 1,
            prev_hash: GENESIS_HASH.to_string(),
            kind: AuditEventKind::EventAccepted,
            payload: serde_json::json!({ "event_id": "evt-1" }),
            actor: Actor::System,
            metadata: AuditMetadata::default(),
            ts_ms: 0,
            hash: String::new(),
        };
        record.hash = compute_hash(&record.prev_hash, record.seq, &record.kind, &record.payload);
        assert!(verify_record(&record));
        record.payload = serde_json::json!({ "event_id": "tampered" });
        assert!(!verify_record(&record));
    }

    #[test]
    fn verify_chain_detects_broken_prev_hash_link() {
        let record = AuditRecord {
            bout_id: "bout-1".into(),
            seq: 2,
            prev_hash: "not-the-genesis-hash".into(),
            kind: AuditEventKind::EventAccepted,
            payload: Value::Null,
            actor: Actor::System,
            metadata: AuditMetadata::default(),
            ts_ms: 0,
            hash: compute_hash("not-the-genesis-hash", 2, &AuditEventKind::EventAccepted, &Value::Null),
        };
        assert!(verify_chain(&[record]).is_err());
    }
}
