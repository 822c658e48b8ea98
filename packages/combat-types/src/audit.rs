//! Shape of one entry in the hash-chained audit log (§3 "Audit record",
//! §4.10). The hashing itself lives in `combat-core::audit` — this
//! crate only defines what an entry looks like, so every component
//! that writes entries agrees on the shape.

use serde::{Deserialize, Serialize};

/// Genesis value for entry 1's previous-hash (§3 invariant 2): a
/// SHA-256-shaped all-zero hex string.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventKind {
    EventAccepted,
    EventRejected,
    HarmonizedEventEmitted,
    RoundVerdictComputed,
    ManualEdit,
    ScoringFault,
}

/// Who produced an audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Actor {
    Judge(String),
    CvWorker(String),
    ScoringEngine,
    System,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cv_model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub judge_device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scoring_engine_version: Option<String>,
}

/// One entry in a bout's hash chain (§3 "Audit record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub bout_id: String,
    /// Strictly increasing within the bout, starting at 1.
    pub seq: u64,
    pub prev_hash: String,
    pub kind: AuditEventKind,
    pub payload: serde_json::Value,
    pub actor: Actor,
    #[serde(default)]
    pub metadata: AuditMetadata,
    pub ts_ms: i64,
    /// SHA-256 over (prev_hash, seq, kind, payload) — filled in by the
    /// logger at append time.
    pub hash: String,
}
