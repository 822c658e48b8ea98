//! # pipeline
//!
//! Event Pipeline (§4.6): deduplication and confidence gating. A
//! bounded hash of recently-seen fingerprints guards against
//! retransmitted events; a confidence floor guards against low-quality
//! CV detections. Grounded directly on §4.6 — the bounded-state idiom
//! mirrors `worker_manager.py`'s routing history, though this stage has
//! no direct original-source counterpart of its own.

use std::collections::HashMap;

use combat_types::{CombatEvent, EventKind, FighterId};

use crate::config::DedupConfig;
use crate::error::{GateOutcome, RejectReason};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    bout_id: String,
    round: u32,
    fighter: FighterId,
    kind: EventKind,
    bucket: i64,
}

fn fingerprint(event: &CombatEvent, bucket_ms: i64) -> Fingerprint {
    Fingerprint {
        bout_id: event.header().bout_id.clone(),
        round: event.header().round,
        fighter: event.fighter(),
        kind: event.kind(),
        bucket: event.ts_ms().div_euclid(bucket_ms),
    }
}

pub struct EventPipeline {
    config: DedupConfig,
    seen: HashMap<Fingerprint, i64>,
}

impl EventPipeline {
    pub fn new(config: DedupConfig) -> Self {
        Self { config, seen: HashMap::new() }
    }

    /// Evaluates one event against the dedup+confidence gate. Judge
    /// events bypass the confidence gate (§4.6, §7).
    pub fn admit(&mut self, event: &CombatEvent) -> GateOutcome {
        self.evict_expired(event.ts_ms());

        let fp = fingerprint(event, self.config.window_ms);
        if self.seen.contains_key(&fp) {
            return GateOutcome::Rejected(RejectReason::Duplicate);
        }

        let is_judge = event.header().source == combat_types::EventSource::ManualOperator;
        if !is_judge && event.header().confidence < self.config.confidence_threshold {
            return GateOutcome::Rejected(RejectReason::Confidence);
        }

        self.seen.insert(fp, event.ts_ms());
        GateOutcome::Accepted
    }

    fn evict_expired(&mut self, now_ts_ms: i64) {
        let expiry = 2 * self.config.window_ms;
        self.seen.retain(|_, &mut bucket_ts| now_ts_ms - bucket_ts <= expiry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::{EventHeader, EventSource};

    fn strike(ts_ms: i64, confidence: f32, source: EventSource) -> CombatEvent {
        let header = EventHeader::new("e", "bout-1", 1, FighterId::Red, ts_ms, confidence, source);
        CombatEvent::StrikeHighImpact { header, technique: combat_types::Technique::Cross, severity: 0.8 }
    }

    #[test]
    fn first_occurrence_is_accepted() {
        let mut pipeline = EventPipeline::new(DedupConfig::default());
        let outcome = pipeline.admit(&strike(0, 0.9, EventSource::CvSystem));
        assert_eq!(outcome, GateOutcome::Accepted);
    }

    #[test]
    fn same_fingerprint_within_window_is_rejected_as_duplicate() {
        let mut pipeline = EventPipeline::new(DedupConfig::default());
        pipeline.admit(&strike(0, 0.9, EventSource::CvSystem));
        let outcome = pipeline.admit(&strike(50, 0.9, EventSource::CvSystem));
        assert_eq!(outcome, GateOutcome::Rejected(RejectReason::Duplicate));
    }

    #[test]
    fn same_fingerprint_separated_by_over_2x_window_is_admitted_twice() {
        let mut pipeline = EventPipeline::new(DedupConfig::default());
        pipeline.admit(&strike(0, 0.9, EventSource::CvSystem));
        let outcome = pipeline.admit(&strike(250, 0.9, EventSource::CvSystem));
        assert_eq!(outcome, GateOutcome::Accepted);
    }

    #[test]
    fn low_confidence_cv_event_is_rejected() {
        let mut pipeline = EventPipeline::new(DedupConfig::default());
        let outcome = pipeline.admit(&strike(0, 0.2, EventSource::CvSystem));
        assert_eq!(outcome, GateOutcome::Rejected(RejectReason::Confidence));
    }

    #[test]
    fn low_confidence_judge_event_bypasses_gate() {
        let mut pipeline = EventPipeline::new(DedupConfig::default());
        let outcome = pipeline.admit(&strike(0, 0.2, EventSource::ManualOperator));
        assert_eq!(outcome, GateOutcome::Accepted);
    }
}
