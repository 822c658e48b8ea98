//! Shapes produced by the Harmonizer (§4.7): conflict classification,
//! resolution strategy, and the harmonised event itself.

use serde::{Deserialize, Serialize};

use crate::event::CombatEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictType {
    Duplicate,
    TypeContradiction,
    SeverityMismatch,
    TimestampProximity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionStrategy {
    JudgeOverride,
    CvPriority,
    SeverityPriority,
    WeightedConfidence,
    Hybrid,
}

/// A singleton (unconflicted) or conflict-resolved event leaving the
/// Harmonizer, with explicit provenance of how it was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarmonizedEvent {
    pub event: CombatEvent,
    /// ids of the event(s) this was derived from — one for a singleton
    /// pass-through, two for a resolved conflict.
    pub source_event_ids: Vec<String>,
    pub conflict_resolved: bool,
    pub conflict_type: Option<ConflictType>,
    pub resolution_strategy: Option<ResolutionStrategy>,
}

/// Running counters exposed by the Harmonizer for operational
/// visibility (mirrors the source engine's stats object).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarmonizerStats {
    pub total_processed: u64,
    pub conflicts_detected: u64,
    pub judge_overrides: u64,
    pub cv_priorities: u64,
    pub hybrid_merges: u64,
    pub conflicts_by_type: std::collections::BTreeMap<String, u64>,
    pub resolutions_by_strategy: std::collections::BTreeMap<String, u64>,
}
