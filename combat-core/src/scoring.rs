//! # scoring
//!
//! Scoring Engine v3 (§4.8): turns a round's event list into a
//! `RoundVerdict` via five regularisation rules and an impact-lock
//! priority system. Grounded on
//! `original_source/backend/scoring_engine_v2/engine_v3.py`; the
//! control-continuity split (R3) and the ground-and-pound inference are
//! re-architected per the decisions recorded in `DESIGN.md`.

use std::collections::{BTreeMap, HashMap, HashSet};

use combat_types::{
    CombatEvent, ControlKind, EventKind, FighterId, GroundStrikeQuality, ImpactFlags, RoundVerdict,
    SubmissionDepth, Technique, Winner, WinnerReason,
};

use crate::config::{RegularisationStep, ScoringConfig};
use crate::error::ScoringError;

/// Per-event technique bucket used by R1. Excludes control events
/// (R3 owns their regularisation) and stuffed takedowns (R5 owns
/// theirs, independently of R1 — §9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TechniqueKey(EventKind, Option<Technique>, Option<SubmissionDepth>);

fn technique_key(event: &CombatEvent) -> Option<TechniqueKey> {
    match event {
        CombatEvent::StrikeSignificant { technique, .. } | CombatEvent::StrikeHighImpact { technique, .. } => {
            Some(TechniqueKey(event.kind(), Some(*technique), None))
        }
        CombatEvent::KnockdownFlash { .. } | CombatEvent::KnockdownHard { .. } | CombatEvent::KnockdownNearFinish { .. } => {
            Some(TechniqueKey(event.kind(), None, None))
        }
        CombatEvent::Rocked { .. } => Some(TechniqueKey(event.kind(), None, None)),
        CombatEvent::TakedownLanded { .. } => Some(TechniqueKey(event.kind(), None, None)),
        CombatEvent::SubmissionAttempt { depth, .. } => Some(TechniqueKey(event.kind(), None, Some(*depth))),
        _ => None,
    }
}

fn base_points(event: &CombatEvent, config: &ScoringConfig) -> f64 {
    match event {
        CombatEvent::StrikeSignificant { technique, .. } => technique.base_points() as f64 * 2.0,
        CombatEvent::StrikeHighImpact { technique, .. } => technique.base_points() as f64,
        CombatEvent::KnockdownFlash { .. } => 100.0,
        CombatEvent::KnockdownHard { .. } => 150.0,
        CombatEvent::KnockdownNearFinish { .. } => 210.0,
        CombatEvent::Rocked { .. } => 60.0,
        CombatEvent::TakedownLanded { .. } => 10.0,
        CombatEvent::TakedownAttempt { .. } => 5.0,
        CombatEvent::SubmissionAttempt { depth, .. } => match depth {
            SubmissionDepth::Light => 12.0,
            SubmissionDepth::Deep => 28.0,
            SubmissionDepth::NearFinish => 60.0,
        },
        CombatEvent::ControlStart { .. } | CombatEvent::ControlEnd { .. } => 0.0,
        CombatEvent::MomentumSwing { .. } => 0.0,
    }
}

fn ladder_multiplier(steps: &[RegularisationStep], count: u32) -> f64 {
    for step in steps {
        if count <= step.upto {
            return step.multiplier;
        }
    }
    1.0
}

#[derive(Debug, Clone, Default)]
pub struct ScoredEventDebug {
    pub event_id: String,
    pub kind: EventKind,
    pub base_points: f64,
    pub technique_mult: f64,
    pub ss_mult: f64,
    pub control_mult: f64,
    pub td_stuffed_mult: f64,
    pub final_points: f64,
}

#[derive(Debug, Clone, Default)]
struct FighterRoundState {
    technique_counts: HashMap<TechniqueKey, u32>,
    ss_total_count: u32,
    takedown_stuffed_count: u32,
    control_continuous_sec: HashMap<ControlKind, f64>,
    control_last_ts_ms: HashMap<ControlKind, i64>,
    control_open_since_ms: HashMap<ControlKind, i64>,
    active_control_kinds: HashSet<ControlKind>,
    raw_points: f64,
    strike_points: f64,
    control_points: f64,
    gnp_hard_points: f64,
    has_submission: bool,
    impact_flags: ImpactFlags,
    events: Vec<ScoredEventDebug>,
}

#[derive(Debug, Clone, Default)]
pub struct FighterDebug {
    pub technique_counts: BTreeMap<String, u32>,
    pub ss_total_count: u32,
    pub takedown_stuffed_count: u32,
    pub strike_points: f64,
    pub control_points: f64,
    pub gnp_hard_points: f64,
    pub has_submission: bool,
    pub events: Vec<ScoredEventDebug>,
}

/// Per-invocation debug snapshot (§4.8), consumed by the Audit Log to
/// record why a verdict came out the way it did.
#[derive(Debug, Clone, Default)]
pub struct ScoringDebug {
    pub red: FighterDebug,
    pub blue: FighterDebug,
    pub lock_holder: Option<FighterId>,
}

pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn score_round(
        &self,
        bout_id: &str,
        round: u32,
        events: &[CombatEvent],
    ) -> Result<(RoundVerdict, ScoringDebug), ScoringError> {
        let mut sorted: Vec<&CombatEvent> = events.iter().collect();
        sorted.sort_by_key(|e| (e.ts_ms(), e.fighter(), e.kind()));

        let mut red = FighterRoundState::default();
        let mut blue = FighterRoundState::default();

        for event in sorted {
            let state = match event.fighter() {
                FighterId::Red => &mut red,
                FighterId::Blue => &mut blue,
            };
            self.score_event(event, state);
        }

        let red_discount = self.apply_control_without_work(&mut red);
        let blue_discount = self.apply_control_without_work(&mut blue);

        for (state, event_id) in [(&red, "RED"), (&blue, "BLUE")] {
            let summed: f64 = state.events.iter().map(|e| e.final_points).sum();
            if (summed - state.raw_points).abs() > 1e-6 {
                return Err(ScoringError::InvariantViolation {
                    event_id: event_id.to_string(),
                    expected: summed,
                    actual: state.raw_points,
                });
            }
        }

        let (winner, winner_reason, delta, lock_holder) = self.determine_winner(&red, &blue);
        let (red_score, blue_score) = self.determine_round_score(winner, delta, &red, &blue);

        let total = red.raw_points + blue.raw_points;
        let (red_share, blue_share) = if total > 0.0 {
            (red.raw_points / total * 100.0, blue.raw_points / total * 100.0)
        } else {
            (50.0, 50.0)
        };

        let mut raw_points = BTreeMap::new();
        raw_points.insert(FighterId::Red, red.raw_points);
        raw_points.insert(FighterId::Blue, blue.raw_points);

        let mut share_percent = BTreeMap::new();
        share_percent.insert(FighterId::Red, red_share);
        share_percent.insert(FighterId::Blue, blue_share);

        let mut impact_flags = BTreeMap::new();
        impact_flags.insert(FighterId::Red, red.impact_flags);
        impact_flags.insert(FighterId::Blue, blue.impact_flags);

        let mut ten_point_must = BTreeMap::new();
        ten_point_must.insert(FighterId::Red, red_score);
        ten_point_must.insert(FighterId::Blue, blue_score);

        let mut control_discount_applied = BTreeMap::new();
        control_discount_applied.insert(FighterId::Red, red_discount);
        control_discount_applied.insert(FighterId::Blue, blue_discount);

        let mut breakdown = BTreeMap::new();
        breakdown.insert(FighterId::Red, breakdown_for(&red));
        breakdown.insert(FighterId::Blue, breakdown_for(&blue));

        let verdict = RoundVerdict {
            bout_id: bout_id.to_string(),
            round,
            raw_points,
            share_percent,
            impact_flags,
            winner,
            winner_reason,
            ten_point_must,
            breakdown,
            control_discount_applied,
        };

        let debug = ScoringDebug { red: fighter_debug(&red), blue: fighter_debug(&blue), lock_holder };

        Ok((verdict, debug))
    }

    fn score_event(&self, event: &CombatEvent, state: &mut FighterRoundState) {
        match event {
            CombatEvent::ControlStart { kind, header } => {
                state.active_control_kinds.insert(*kind);
                state.control_open_since_ms.entry(*kind).or_insert(header.ts_ms);
                return;
            }
            CombatEvent::ControlEnd { kind, header } => {
                state.active_control_kinds.remove(kind);
                let Some(start_ts) = state.control_open_since_ms.remove(kind) else { return };
                self.score_control_span(state, *kind, start_ts, header.ts_ms);
                return;
            }
            CombatEvent::MomentumSwing { .. } => return,
            _ => {}
        }

        let base = base_points(event, &self.config);

        let mut technique_mult = 1.0;
        if let Some(key) = technique_key(event) {
            let count = state.technique_counts.entry(key).or_insert(0);
            *count += 1;
            technique_mult = ladder_multiplier(&self.config.regularisation.technique_ladder, *count);
        }

        let mut ss_mult = 1.0;
        if matches!(event, CombatEvent::StrikeSignificant { .. }) {
            state.ss_total_count += 1;
            ss_mult = ladder_multiplier(&self.config.regularisation.strike_abuse_ladder, state.ss_total_count);
        }

        let mut td_stuffed_mult = 1.0;
        if matches!(event, CombatEvent::TakedownAttempt { .. }) {
            state.takedown_stuffed_count += 1;
            td_stuffed_mult =
                ladder_multiplier(&self.config.regularisation.takedown_stuff_ladder, state.takedown_stuffed_count);
        }

        let final_points = base * technique_mult * ss_mult * td_stuffed_mult;
        state.raw_points += final_points;

        let is_strike = matches!(event, CombatEvent::StrikeSignificant { .. } | CombatEvent::StrikeHighImpact { .. });
        if is_strike {
            state.strike_points += final_points;
            if !state.active_control_kinds.is_empty() {
                let quality = if matches!(event, CombatEvent::StrikeHighImpact { .. }) {
                    GroundStrikeQuality::Solid
                } else {
                    GroundStrikeQuality::Light
                };
                if quality == GroundStrikeQuality::Solid {
                    state.gnp_hard_points += final_points;
                }
            }
        }

        if matches!(event, CombatEvent::SubmissionAttempt { .. }) {
            state.has_submission = true;
        }

        match event {
            CombatEvent::Rocked { .. } => state.impact_flags.rocked = true,
            CombatEvent::KnockdownFlash { .. } => state.impact_flags.kd_flash = true,
            CombatEvent::KnockdownHard { .. } => state.impact_flags.kd_hard = true,
            CombatEvent::KnockdownNearFinish { .. } => state.impact_flags.kd_nf = true,
            CombatEvent::SubmissionAttempt { depth: SubmissionDepth::NearFinish, .. } => {
                state.impact_flags.sub_near_finish = true
            }
            _ => {}
        }

        state.events.push(ScoredEventDebug {
            event_id: event.event_id().to_string(),
            kind: event.kind(),
            base_points: base,
            technique_mult,
            ss_mult,
            control_mult: 1.0,
            td_stuffed_mult,
            final_points,
        });
    }

    /// Scores one control span (§4.8 R3), splitting into full-rate and
    /// discounted-rate bucket sub-totals when the span straddles the
    /// continuity threshold (§8 boundary behaviour).
    fn score_control_span(&self, state: &mut FighterRoundState, kind: ControlKind, start_ts_ms: i64, end_ts_ms: i64) {
        let cfg = &self.config.regularisation;
        let last_ts = state.control_last_ts_ms.get(&kind).copied();
        let gap_ms = (cfg.control_gap_reset_sec * 1000.0) as i64;
        let continuous_before = match last_ts {
            Some(last) if start_ts_ms - last > gap_ms => 0.0,
            Some(_) => *state.control_continuous_sec.get(&kind).unwrap_or(&0.0),
            None => 0.0,
        };

        let duration_sec = ((end_ts_ms - start_ts_ms).max(0) as f64) / 1000.0;
        let bucket_sec = self.config.control_bucket_sec;
        let num_buckets = ((duration_sec / bucket_sec) as u32).max(1);

        let mut points = 0.0;
        let mut any_discounted = false;
        for b in 0..num_buckets {
            let pre_continuous = continuous_before + (b as f64) * bucket_sec;
            let mult = if pre_continuous > cfg.control_continuity_threshold_sec {
                any_discounted = true;
                cfg.control_continuity_multiplier
            } else {
                1.0
            };
            points += self.config.control_points_per_bucket * mult;
        }

        state.control_continuous_sec.insert(kind, continuous_before + duration_sec);
        state.control_last_ts_ms.insert(kind, end_ts_ms);

        state.raw_points += points;
        state.control_points += points;

        state.events.push(ScoredEventDebug {
            event_id: format!("control-{kind:?}-{start_ts_ms}"),
            kind: EventKind::ControlEnd,
            base_points: self.config.control_points_per_bucket * num_buckets as f64,
            technique_mult: 1.0,
            ss_mult: 1.0,
            control_mult: if any_discounted { cfg.control_continuity_multiplier } else { 1.0 },
            td_stuffed_mult: 1.0,
            final_points: points,
        });
    }

    /// R4: discounts a fighter's control subtotal when they've
    /// accumulated control without matching offensive work. Returns
    /// whether the discount was applied.
    fn apply_control_without_work(&self, state: &mut FighterRoundState) -> bool {
        let cfg = &self.config.regularisation;
        if state.control_points < cfg.control_without_work_min_points {
            return false;
        }
        let has_work = state.strike_points >= cfg.control_without_work_max_strike_points
            || state.has_submission
            || state.gnp_hard_points >= cfg.control_without_work_max_ground_points;
        if has_work {
            return false;
        }

        let discount = state.control_points * (1.0 - cfg.control_without_work_multiplier);
        state.raw_points -= discount;
        state.control_points *= cfg.control_without_work_multiplier;
        true
    }

    fn determine_winner(
        &self,
        red: &FighterRoundState,
        blue: &FighterRoundState,
    ) -> (Winner, WinnerReason, f64, Option<FighterId>) {
        let delta = (red.raw_points - blue.raw_points).abs();
        let points_leader = if red.raw_points > blue.raw_points {
            Winner::Red
        } else if blue.raw_points > red.raw_points {
            Winner::Blue
        } else {
            Winner::Draw
        };

        let red_lock = strongest_lock(&red.impact_flags);
        let blue_lock = strongest_lock(&blue.impact_flags);

        match (red_lock, blue_lock) {
            (Some(r), Some(b)) => {
                if lock_priority(r) < lock_priority(b) {
                    self.apply_impact_lock(FighterId::Red, r, points_leader, delta)
                } else if lock_priority(b) < lock_priority(r) {
                    self.apply_impact_lock(FighterId::Blue, b, points_leader, delta)
                } else {
                    (points_leader, WinnerReason::Points, delta, None)
                }
            }
            (Some(r), None) => self.apply_impact_lock(FighterId::Red, r, points_leader, delta),
            (None, Some(b)) => self.apply_impact_lock(FighterId::Blue, b, points_leader, delta),
            (None, None) => (points_leader, WinnerReason::Points, delta, None),
        }
    }

    fn apply_impact_lock(
        &self,
        holder: FighterId,
        lock: WinnerReason,
        points_leader: Winner,
        delta: f64,
    ) -> (Winner, WinnerReason, f64, Option<FighterId>) {
        let threshold = self.lock_threshold(lock);
        let holder_winner = match holder {
            FighterId::Red => Winner::Red,
            FighterId::Blue => Winner::Blue,
        };

        if points_leader == holder_winner {
            (holder_winner, WinnerReason::Points, delta, Some(holder))
        } else if points_leader == Winner::Draw {
            (holder_winner, lock, delta, Some(holder))
        } else if delta >= threshold {
            (points_leader, WinnerReason::Points, delta, Some(holder))
        } else {
            (holder_winner, lock, delta, Some(holder))
        }
    }

    fn lock_threshold(&self, lock: WinnerReason) -> f64 {
        let locks = &self.config.impact_locks;
        match lock {
            WinnerReason::LockRocked => locks.rocked.delta_threshold,
            WinnerReason::LockKdFlash => locks.kd_flash.delta_threshold,
            WinnerReason::LockKdHard => locks.kd_hard.delta_threshold,
            WinnerReason::LockKdNf => locks.kd_near_finish.delta_threshold,
            WinnerReason::LockSubNf => locks.sub_near_finish.delta_threshold,
            WinnerReason::Points => 0.0,
        }
    }

    fn determine_round_score(
        &self,
        winner: Winner,
        delta: f64,
        red: &FighterRoundState,
        blue: &FighterRoundState,
    ) -> (u8, u8) {
        let round_cfg = &self.config.round;
        if winner == Winner::Draw {
            return (10, 10);
        }

        let winner_state = if winner == Winner::Red { red } else { blue };
        let protected = winner_state.impact_flags.protected_count();

        if protected >= round_cfg.protected_count_10_7 || delta >= round_cfg.min_delta_10_7 {
            return if winner == Winner::Red { (10, 7) } else { (7, 10) };
        }
        if protected >= round_cfg.protected_count_10_8 || delta >= round_cfg.min_delta_10_8 {
            return if winner == Winner::Red { (10, 8) } else { (8, 10) };
        }
        if winner == Winner::Red { (10, 9) } else { (9, 10) }
    }
}

fn strongest_lock(flags: &ImpactFlags) -> Option<WinnerReason> {
    if flags.rocked {
        return Some(WinnerReason::LockRocked);
    }
    if flags.kd_flash {
        return Some(WinnerReason::LockKdFlash);
    }
    if flags.kd_hard {
        return Some(WinnerReason::LockKdHard);
    }
    if flags.kd_nf {
        return Some(WinnerReason::LockKdNf);
    }
    if flags.sub_near_finish {
        return Some(WinnerReason::LockSubNf);
    }
    None
}

fn lock_priority(lock: WinnerReason) -> u8 {
    match lock {
        WinnerReason::LockRocked => 0,
        WinnerReason::LockKdFlash => 1,
        WinnerReason::LockKdHard => 2,
        WinnerReason::LockKdNf => 3,
        WinnerReason::LockSubNf => 4,
        WinnerReason::Points => 255,
    }
}

fn breakdown_for(state: &FighterRoundState) -> BTreeMap<EventKind, f64> {
    let mut out: BTreeMap<EventKind, f64> = BTreeMap::new();
    for event in &state.events {
        *out.entry(event.kind).or_insert(0.0) += event.final_points;
    }
    out
}

fn fighter_debug(state: &FighterRoundState) -> FighterDebug {
    let mut technique_counts = BTreeMap::new();
    for (key, count) in &state.technique_counts {
        technique_counts.insert(format!("{:?}", key.0), *count);
    }
    FighterDebug {
        technique_counts,
        ss_total_count: state.ss_total_count,
        takedown_stuffed_count: state.takedown_stuffed_count,
        strike_points: state.strike_points,
        control_points: state.control_points,
        gnp_hard_points: state.gnp_hard_points,
        has_submission: state.has_submission,
        events: state.events.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::{EventHeader, EventSource};

    fn header(fighter: FighterId, ts_ms: i64) -> EventHeader {
        EventHeader::new(format!("e-{ts_ms}"), "bout-1", 1, fighter, ts_ms, 0.9, EventSource::CvSystem)
    }

    fn cross(fighter: FighterId, ts_ms: i64) -> CombatEvent {
        CombatEvent::StrikeHighImpact { header: header(fighter, ts_ms), technique: Technique::Cross, severity: 0.5 }
    }

    fn kd_flash(fighter: FighterId, ts_ms: i64) -> CombatEvent {
        CombatEvent::KnockdownFlash { header: header(fighter, ts_ms), severity: 0.9 }
    }

    fn control_span(fighter: FighterId, kind: ControlKind, start_ms: i64, end_ms: i64) -> Vec<CombatEvent> {
        vec![
            CombatEvent::ControlStart { header: header(fighter, start_ms), kind },
            CombatEvent::ControlEnd { header: header(fighter, end_ms), kind },
        ]
    }

    #[test]
    fn kd_flash_lock_holds_against_insufficient_volume() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let mut events = vec![kd_flash(FighterId::Red, 0)];
        for i in 0..60 {
            events.push(cross(FighterId::Blue, 1000 + i * 100));
        }
        let (verdict, _) = engine.score_round("bout-1", 1, &events).unwrap();
        assert_eq!(verdict.winner, Winner::Red);
        assert_eq!(verdict.winner_reason, WinnerReason::LockKdFlash);
        assert_eq!(verdict.ten_point_must[&FighterId::Red], 9);
    }

    #[test]
    fn volume_overcomes_lock_once_delta_clears_threshold() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let mut events = vec![kd_flash(FighterId::Red, 0)];
        for i in 0..85 {
            events.push(cross(FighterId::Blue, 1000 + i * 100));
        }
        let (verdict, _) = engine.score_round("bout-1", 1, &events).unwrap();
        assert_eq!(verdict.winner, Winner::Blue);
        assert_eq!(verdict.winner_reason, WinnerReason::Points);
    }

    #[test]
    fn control_without_work_discount_applies() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let events = control_span(FighterId::Red, ControlKind::Top, 0, 70_000);
        let (verdict, _) = engine.score_round("bout-1", 1, &events).unwrap();
        assert!((verdict.raw_points[&FighterId::Red] - 15.75).abs() < 1e-6);
        assert!(verdict.control_discount_applied[&FighterId::Red]);
    }

    #[test]
    fn control_span_straddling_threshold_splits_subtotals() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let first = control_span(FighterId::Red, ControlKind::Top, 0, 55_000);
        let second = control_span(FighterId::Red, ControlKind::Top, 55_000, 75_000);
        let mut events = first;
        events.extend(second);
        let (verdict, _) = engine.score_round("bout-1", 1, &events).unwrap();
        // first span (0-55s): 5 buckets, all pre-bucket continuous <= 60s -> full rate, 15.0
        // second span (55-75s): 2 buckets; bucket 0 starts at continuous=55 (full), bucket 1
        // starts at continuous=65 (over threshold) -> one full + one discounted = 3.0 + 1.5
        assert!((verdict.raw_points[&FighterId::Red] - 19.5).abs() < 1e-6);
    }

    #[test]
    fn regularisation_ladder_discounts_high_volume_strikes() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let mut events = vec![];
        for i in 0..25 {
            events.push(cross(FighterId::Red, i * 100));
        }
        let (verdict, _) = engine.score_round("bout-1", 1, &events).unwrap();
        assert!((verdict.raw_points[&FighterId::Red] - 60.0).abs() < 1e-6);
    }

    #[test]
    fn zero_points_no_flags_is_a_draw() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let (verdict, _) = engine.score_round("bout-1", 1, &[]).unwrap();
        assert_eq!(verdict.winner, Winner::Draw);
        assert_eq!(verdict.ten_point_must[&FighterId::Red], 10);
        assert_eq!(verdict.ten_point_must[&FighterId::Blue], 10);
    }

    #[test]
    fn takedown_stuffed_cap_applies_independently_of_landed_count() {
        let engine = ScoringEngine::new(ScoringConfig::default());
        let mut events = vec![];
        for i in 0..5 {
            events.push(CombatEvent::TakedownAttempt { header: header(FighterId::Red, i * 100) });
        }
        let (verdict, _) = engine.score_round("bout-1", 1, &events).unwrap();
        // 3 at full (5.0) + 2 at half (2.5) = 15 + 5 = 20
        assert!((verdict.raw_points[&FighterId::Red] - 20.0).abs() < 1e-6);
    }
}
