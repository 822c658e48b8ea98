//! # harmonizer
//!
//! Harmonizer (§4.7): merges concurrent judge and CV event streams,
//! detecting and resolving conflicts within a proximity window.
//! Grounded on
//! `original_source/backend/event_harmonizer/harmonizer_engine.py` and
//! `original_source/backend/event_harmonizer/conflict_resolver.py`.
//! Processing is serialised through `&mut self`; the composition root
//! runs one Harmonizer per bout on a single cooperative task (§5).

use std::collections::VecDeque;

use combat_types::{CombatEvent, ConflictType, EventKind, HarmonizedEvent, HarmonizerStats, ResolutionStrategy};

use crate::config::HarmoniserConfig;

pub struct Harmonizer {
    config: HarmoniserConfig,
    judge_buffer: VecDeque<CombatEvent>,
    cv_buffer: VecDeque<CombatEvent>,
    stats: HarmonizerStats,
}

impl Harmonizer {
    pub fn new(config: HarmoniserConfig) -> Self {
        Self {
            config,
            judge_buffer: VecDeque::new(),
            cv_buffer: VecDeque::new(),
            stats: HarmonizerStats::default(),
        }
    }

    pub fn process_judge_event(&mut self, event: CombatEvent) -> Vec<HarmonizedEvent> {
        self.harmonize_event(event, true)
    }

    pub fn process_cv_event(&mut self, event: CombatEvent) -> Vec<HarmonizedEvent> {
        self.harmonize_event(event, false)
    }

    pub fn stats(&self) -> &HarmonizerStats {
        &self.stats
    }

    fn harmonize_event(&mut self, new_event: CombatEvent, is_judge: bool) -> Vec<HarmonizedEvent> {
        self.stats.total_processed += 1;

        let opposite = if is_judge { &self.cv_buffer } else { &self.judge_buffer };
        let conflicts: Vec<CombatEvent> = opposite
            .iter()
            .filter(|candidate| {
                (new_event.ts_ms() - candidate.ts_ms()).abs() <= self.config.proximity_window_ms
                    && candidate.fighter() == new_event.fighter()
            })
            .cloned()
            .collect();

        let mut out = Vec::new();
        if conflicts.is_empty() {
            out.push(HarmonizedEvent {
                event: new_event.clone(),
                source_event_ids: vec![new_event.event_id().to_string()],
                conflict_resolved: false,
                conflict_type: None,
                resolution_strategy: None,
            });
        } else {
            for candidate in &conflicts {
                let (judge_event, cv_event) =
                    if is_judge { (&new_event, candidate) } else { (candidate, &new_event) };

                let conflict_type = self.classify_conflict(judge_event, cv_event);
                self.stats.conflicts_detected += 1;
                *self.stats.conflicts_by_type.entry(conflict_label(conflict_type).to_string()).or_insert(0) += 1;

                let strategy = self.select_resolution_strategy(conflict_type, judge_event, cv_event);
                let resolved = resolve_conflict(judge_event, cv_event, strategy);

                *self.stats.resolutions_by_strategy.entry(strategy_label(strategy).to_string()).or_insert(0) += 1;
                match strategy {
                    ResolutionStrategy::JudgeOverride => self.stats.judge_overrides += 1,
                    ResolutionStrategy::CvPriority => self.stats.cv_priorities += 1,
                    ResolutionStrategy::Hybrid => self.stats.hybrid_merges += 1,
                    _ => {}
                }

                out.push(HarmonizedEvent {
                    event: resolved,
                    source_event_ids: vec![judge_event.event_id().to_string(), cv_event.event_id().to_string()],
                    conflict_resolved: true,
                    conflict_type: Some(conflict_type),
                    resolution_strategy: Some(strategy),
                });
            }
        }

        let own_buffer = if is_judge { &mut self.judge_buffer } else { &mut self.cv_buffer };
        own_buffer.push_back(new_event);
        while own_buffer.len() > self.config.buffer_size {
            own_buffer.pop_front();
        }

        out
    }

    fn classify_conflict(&self, judge_event: &CombatEvent, cv_event: &CombatEvent) -> ConflictType {
        if judge_event.kind() == cv_event.kind() {
            return ConflictType::Duplicate;
        }
        if are_contradicting_knockdowns(judge_event.kind(), cv_event.kind()) {
            return ConflictType::TypeContradiction;
        }
        let severity_diff =
            (judge_event.severity().unwrap_or(0.0) - cv_event.severity().unwrap_or(0.0)).abs();
        if severity_diff > self.config.severity_mismatch_threshold {
            return ConflictType::SeverityMismatch;
        }
        ConflictType::TimestampProximity
    }

    fn select_resolution_strategy(
        &self,
        conflict_type: ConflictType,
        judge_event: &CombatEvent,
        cv_event: &CombatEvent,
    ) -> ResolutionStrategy {
        if judge_event.header().confidence >= self.config.judge_override_threshold {
            return ResolutionStrategy::JudgeOverride;
        }
        if cv_event.header().confidence >= self.config.cv_confidence_threshold {
            return ResolutionStrategy::CvPriority;
        }
        match conflict_type {
            ConflictType::TypeContradiction => ResolutionStrategy::SeverityPriority,
            ConflictType::Duplicate => ResolutionStrategy::WeightedConfidence,
            _ => ResolutionStrategy::Hybrid,
        }
    }
}

fn are_contradicting_knockdowns(a: EventKind, b: EventKind) -> bool {
    let is_kd = |k: EventKind| {
        matches!(k, EventKind::KnockdownFlash | EventKind::KnockdownHard | EventKind::KnockdownNearFinish)
    };
    is_kd(a) && is_kd(b) && a != b
}

fn resolve_conflict(
    judge_event: &CombatEvent,
    cv_event: &CombatEvent,
    strategy: ResolutionStrategy,
) -> CombatEvent {
    match strategy {
        ResolutionStrategy::JudgeOverride => {
            let mut e = judge_event.clone();
            mark_resolution(&mut e, "judge-override");
            e
        }
        ResolutionStrategy::CvPriority => {
            let mut e = cv_event.clone();
            mark_resolution(&mut e, "cv-priority");
            e
        }
        ResolutionStrategy::SeverityPriority => {
            let winner = if judge_event.severity().unwrap_or(0.0) > cv_event.severity().unwrap_or(0.0) {
                judge_event
            } else {
                cv_event
            };
            let mut e = winner.clone();
            mark_resolution(&mut e, "severity-priority");
            e
        }
        ResolutionStrategy::WeightedConfidence => {
            let judge_conf = judge_event.header().confidence;
            let cv_conf = cv_event.header().confidence;
            let total = (judge_conf + cv_conf).max(f32::EPSILON);
            let judge_weight = judge_conf / total;
            let cv_weight = cv_conf / total;
            let avg_severity =
                judge_event.severity().unwrap_or(0.0) * judge_weight + cv_event.severity().unwrap_or(0.0) * cv_weight;
            let base = if judge_conf > cv_conf { judge_event } else { cv_event };
            let mut e = base.clone();
            e.set_severity(avg_severity);
            e.header_mut().confidence = (judge_conf + cv_conf) / 2.0;
            mark_resolution(&mut e, "weighted-confidence");
            e
        }
        ResolutionStrategy::Hybrid => {
            let mut e = judge_event.clone();
            let severity = judge_event.severity().unwrap_or(0.0) * 0.6 + cv_event.severity().unwrap_or(0.0) * 0.4;
            e.set_severity(severity);
            let mean = (judge_event.header().confidence + cv_event.header().confidence) / 2.0;
            e.header_mut().confidence = (mean * 1.1).min(1.0);
            mark_resolution(&mut e, "hybrid");
            e
        }
    }
}

fn mark_resolution(event: &mut CombatEvent, label: &str) {
    event.header_mut().extra.insert("resolution".to_string(), serde_json::json!(label));
}

fn conflict_label(c: ConflictType) -> &'static str {
    match c {
        ConflictType::Duplicate => "duplicate",
        ConflictType::TypeContradiction => "type-contradiction",
        ConflictType::SeverityMismatch => "severity-mismatch",
        ConflictType::TimestampProximity => "timestamp-proximity",
    }
}

fn strategy_label(s: ResolutionStrategy) -> &'static str {
    match s {
        ResolutionStrategy::JudgeOverride => "judge-override",
        ResolutionStrategy::CvPriority => "cv-priority",
        ResolutionStrategy::SeverityPriority => "severity-priority",
        ResolutionStrategy::WeightedConfidence => "weighted-confidence",
        ResolutionStrategy::Hybrid => "hybrid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::{EventHeader, EventSource, FighterId};

    fn kd(id: &str, ts_ms: i64, confidence: f32, source: EventSource, kind: EventKind) -> CombatEvent {
        let header = EventHeader::new(id, "bout-1", 1, FighterId::Red, ts_ms, confidence, source);
        match kind {
            EventKind::KnockdownFlash => CombatEvent::KnockdownFlash { header, severity: 0.8 },
            EventKind::KnockdownHard => CombatEvent::KnockdownHard { header, severity: 0.9 },
            _ => unreachable!(),
        }
    }

    #[test]
    fn singleton_event_passes_through_unconflicted() {
        let mut h = Harmonizer::new(HarmoniserConfig::default());
        let out = h.process_cv_event(kd("cv-1", 0, 0.7, EventSource::CvSystem, EventKind::KnockdownFlash));
        assert_eq!(out.len(), 1);
        assert!(!out[0].conflict_resolved);
    }

    #[test]
    fn judge_override_wins_on_high_judge_confidence() {
        let mut h = Harmonizer::new(HarmoniserConfig::default());
        h.process_cv_event(kd("cv-1", 1050, 0.75, EventSource::CvSystem, EventKind::KnockdownHard));
        let out = h.process_judge_event(kd("judge-1", 1000, 0.95, EventSource::ManualOperator, EventKind::KnockdownFlash));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].resolution_strategy, Some(ResolutionStrategy::JudgeOverride));
        assert!(matches!(out[0].event, CombatEvent::KnockdownFlash { .. }));
    }

    #[test]
    fn events_outside_proximity_window_are_singletons() {
        let mut h = Harmonizer::new(HarmoniserConfig::default());
        h.process_cv_event(kd("cv-1", 0, 0.7, EventSource::CvSystem, EventKind::KnockdownFlash));
        let out =
            h.process_judge_event(kd("judge-1", 10_000, 0.95, EventSource::ManualOperator, EventKind::KnockdownFlash));
        assert_eq!(out.len(), 1);
        assert!(!out[0].conflict_resolved);
    }

    #[test]
    fn stats_track_total_processed_and_conflicts() {
        let mut h = Harmonizer::new(HarmoniserConfig::default());
        h.process_cv_event(kd("cv-1", 0, 0.5, EventSource::CvSystem, EventKind::KnockdownFlash));
        h.process_judge_event(kd("judge-1", 50, 0.5, EventSource::ManualOperator, EventKind::KnockdownHard));
        assert_eq!(h.stats().total_processed, 2);
        assert_eq!(h.stats().conflicts_detected, 1);
    }
}
