//! fighter_sim.rs — Scripted fighter state machine
//!
//! Advances a simple per-fighter phase machine tick by tick and emits
//! the `RawCvInput` a CV worker would have produced for that tick.
//! Mirrors the teacher simulator's `BoatSim::tick` shape (one
//! stateful struct advanced once per epoch, scenario parameters bias
//! the randomness) but the state being advanced is a fighter's phase
//! in a round rather than a boat's position on the water.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use combat_types::{ActionLabel, Aspect, FighterId, ImpactTier, JudgeEventInput, Keypoint, RawCvInput};

use crate::scenarios::{ScenarioConfig, ScenarioKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Neutral,
    Striking,
    Clinch,
    Ground,
}

struct FighterState {
    phase: Phase,
    ticks_in_phase: u32,
}

impl FighterState {
    fn new() -> Self {
        Self { phase: Phase::Neutral, ticks_in_phase: 0 }
    }
}

pub struct BoutSim {
    bout_id: String,
    round: u32,
    tick: u32,
    scenario: ScenarioConfig,
    red: FighterState,
    blue: FighterState,
    rng: StdRng,
    /// Judge-tablet submissions an operator would plausibly log for the
    /// CV events emitted this tick, drained by `take_judge_events`.
    pending_judge_events: Vec<JudgeEventInput>,
}

fn mock_keypoints() -> [Keypoint; 17] {
    [Keypoint::default(); 17]
}

fn action_confidences(top_action: ActionLabel, top_confidence: f32) -> std::collections::BTreeMap<String, f32> {
    let mut map = std::collections::BTreeMap::new();
    map.insert(format!("{top_action:?}"), top_confidence);
    map
}

impl BoutSim {
    pub fn new(bout_id: impl Into<String>, scenario: ScenarioConfig, rng: StdRng) -> Self {
        Self {
            bout_id: bout_id.into(),
            round: 1,
            tick: 0,
            scenario,
            red: FighterState::new(),
            blue: FighterState::new(),
            rng,
            pending_judge_events: Vec::new(),
        }
    }

    /// Drains the judge-tablet submissions accumulated since the last
    /// call, to be emitted alongside this tick's `RawCvInput`s.
    pub fn take_judge_events(&mut self) -> Vec<JudgeEventInput> {
        std::mem::take(&mut self.pending_judge_events)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn advance_round(&mut self) {
        self.round += 1;
        self.tick = 0;
        self.red = FighterState::new();
        self.blue = FighterState::new();
    }

    /// Advances one tick and returns the `RawCvInput`s a CV worker
    /// would have emitted for any fighter whose phase produced an
    /// observable action this tick. Usually 0 or 1 events.
    pub fn tick(&mut self) -> Vec<RawCvInput> {
        self.tick += 1;
        let mut out = Vec::new();

        for fighter in [FighterId::Red, FighterId::Blue] {
            if let Some(input) = self.tick_fighter(fighter) {
                out.push(input);
            }
        }
        out
    }

    fn aggression_bias(&self, fighter: FighterId) -> f64 {
        let favoured = fighter == self.scenario.favoured;
        match self.scenario.kind {
            ScenarioKind::DominantRound if favoured => 0.55,
            ScenarioKind::DominantRound => 0.15,
            ScenarioKind::CloseRound => 0.35,
            ScenarioKind::KnockdownFinish if favoured => 0.45,
            ScenarioKind::KnockdownFinish => 0.2,
            ScenarioKind::ControlHeavy if favoured => 0.2,
            ScenarioKind::ControlHeavy => 0.1,
            ScenarioKind::NoisyLowConfidence => 0.3,
        }
    }

    fn control_bias(&self, fighter: FighterId) -> f64 {
        let favoured = fighter == self.scenario.favoured;
        match self.scenario.kind {
            ScenarioKind::ControlHeavy if favoured => 0.6,
            ScenarioKind::ControlHeavy => 0.05,
            _ => 0.1,
        }
    }

    fn confidence(&mut self) -> f32 {
        let noise: f64 = Normal::new(0.0, 0.05).unwrap().sample(&mut self.rng);
        (self.scenario.base_confidence as f64 + noise).clamp(0.05, 0.99) as f32
    }

    fn ts_ms(&self) -> i64 {
        (self.tick as f64 * self.scenario.tick_duration_sec * 1000.0) as i64
    }

    fn tick_fighter(&mut self, fighter: FighterId) -> Option<RawCvInput> {
        let aggression = self.aggression_bias(fighter);
        let control = self.control_bias(fighter);
        let roll: f64 = self.rng.gen_range(0.0..1.0);

        let state = match fighter {
            FighterId::Red => &mut self.red,
            FighterId::Blue => &mut self.blue,
        };
        state.ticks_in_phase += 1;
        let current_phase = state.phase;
        let ticks_in_phase = state.ticks_in_phase;

        let next_phase = match current_phase {
            Phase::Neutral if roll < aggression => Phase::Striking,
            Phase::Neutral if roll < aggression + control => Phase::Clinch,
            Phase::Clinch if roll < 0.3 => Phase::Ground,
            Phase::Clinch if roll < 0.6 => Phase::Neutral,
            Phase::Ground if ticks_in_phase > 4 && roll < 0.4 => Phase::Neutral,
            Phase::Striking => Phase::Neutral,
            other => other,
        };
        let transitioned_into_ground = next_phase == Phase::Ground && current_phase != Phase::Ground;
        let transitioned_out_of_ground = current_phase == Phase::Ground && next_phase != Phase::Ground;
        state.phase = next_phase;
        if next_phase != current_phase {
            state.ticks_in_phase = 0;
        }

        let bout_id = self.bout_id.clone();
        let round = self.round;
        let ts_ms = self.ts_ms();
        let confidence = self.confidence();
        let knockdown_roll: f64 = self.rng.gen_range(0.0..1.0);

        match next_phase {
            Phase::Striking => {
                let is_knockdown = matches!(self.scenario.kind, ScenarioKind::KnockdownFinish)
                    && fighter == self.scenario.favoured
                    && self.tick > self.scenario.ticks_per_round / 2
                    && knockdown_roll < 0.02;
                let action = if is_knockdown { ActionLabel::Knockdown } else { ActionLabel::Punch };
                let impact_tier = if is_knockdown { ImpactTier::Critical } else { ImpactTier::Medium };
                if is_knockdown {
                    let mut metadata = serde_json::Map::new();
                    metadata.insert("severity".to_string(), serde_json::json!(0.95));
                    self.pending_judge_events.push(JudgeEventInput {
                        bout_id: self.bout_id.clone(),
                        round: self.round,
                        fighter,
                        aspect: Aspect::Striking,
                        event_type: "knockdown-hard".to_string(),
                        device_role: "judge-tablet".to_string(),
                        ts_ms,
                        metadata,
                    });
                }
                Some(RawCvInput {
                    bout_id,
                    round,
                    frame_camera_id: "cam-1".to_string(),
                    frame_ts_ms: ts_ms,
                    action,
                    action_confidences: action_confidences(action, confidence),
                    impact_detected: matches!(impact_tier, ImpactTier::Heavy | ImpactTier::Critical),
                    impact_tier,
                    fighter_bbox: [0.0, 0.0, 1.0, 1.0],
                    keypoints: mock_keypoints(),
                    flow_magnitude: Some(if is_knockdown { 6.0 } else { 2.5 }),
                    camera_angle_deg: Some(0.0),
                    camera_distance_m: Some(4.0),
                    fighter_id: fighter,
                })
            }
            Phase::Ground if transitioned_into_ground => {
                let mut metadata = serde_json::Map::new();
                metadata.insert("kind".to_string(), serde_json::json!("top"));
                self.pending_judge_events.push(JudgeEventInput {
                    bout_id: self.bout_id.clone(),
                    round: self.round,
                    fighter,
                    aspect: Aspect::Grappling,
                    event_type: "control-start".to_string(),
                    device_role: "judge-tablet".to_string(),
                    ts_ms,
                    metadata,
                });
                Some(RawCvInput {
                    bout_id,
                    round,
                    frame_camera_id: "cam-1".to_string(),
                    frame_ts_ms: ts_ms,
                    action: ActionLabel::Takedown,
                    action_confidences: action_confidences(ActionLabel::Takedown, confidence),
                    impact_detected: false,
                    impact_tier: ImpactTier::Light,
                    fighter_bbox: [0.0, 0.0, 1.0, 1.0],
                    keypoints: mock_keypoints(),
                    flow_magnitude: None,
                    camera_angle_deg: Some(15.0),
                    camera_distance_m: Some(5.0),
                    fighter_id: fighter,
                })
            }
            Phase::Ground => Some(RawCvInput {
                bout_id,
                round,
                frame_camera_id: "cam-1".to_string(),
                frame_ts_ms: ts_ms,
                action: ActionLabel::GroundControl,
                action_confidences: action_confidences(ActionLabel::GroundControl, confidence),
                impact_detected: false,
                impact_tier: ImpactTier::Light,
                fighter_bbox: [0.0, 0.0, 1.0, 1.0],
                keypoints: mock_keypoints(),
                flow_magnitude: None,
                camera_angle_deg: Some(15.0),
                camera_distance_m: Some(5.0),
                fighter_id: fighter,
            }),
            _ if transitioned_out_of_ground => {
                let mut metadata = serde_json::Map::new();
                metadata.insert("kind".to_string(), serde_json::json!("top"));
                self.pending_judge_events.push(JudgeEventInput {
                    bout_id: self.bout_id.clone(),
                    round: self.round,
                    fighter,
                    aspect: Aspect::Grappling,
                    event_type: "control-end".to_string(),
                    device_role: "judge-tablet".to_string(),
                    ts_ms,
                    metadata,
                });
                Some(RawCvInput {
                    bout_id,
                    round,
                    frame_camera_id: "cam-1".to_string(),
                    frame_ts_ms: ts_ms,
                    action: ActionLabel::Standup,
                    action_confidences: action_confidences(ActionLabel::Standup, confidence),
                    impact_detected: false,
                    impact_tier: ImpactTier::Light,
                    fighter_bbox: [0.0, 0.0, 1.0, 1.0],
                    keypoints: mock_keypoints(),
                    flow_magnitude: None,
                    camera_angle_deg: Some(15.0),
                    camera_distance_m: Some(5.0),
                    fighter_id: fighter,
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn dominant_fighter_strikes_more_often_over_many_ticks() {
        let scenario = crate::scenarios::preset_dominant_round(FighterId::Red);
        let mut sim = BoutSim::new("bout-1", scenario, StdRng::seed_from_u64(7));
        let mut red_strikes = 0;
        let mut blue_strikes = 0;
        for _ in 0..500 {
            for input in sim.tick() {
                if input.action == ActionLabel::Punch {
                    match input.fighter_id {
                        FighterId::Red => red_strikes += 1,
                        FighterId::Blue => blue_strikes += 1,
                    }
                }
            }
        }
        assert!(red_strikes > blue_strikes);
    }

    #[test]
    fn ticks_advance_timestamps_monotonically() {
        let scenario = crate::scenarios::preset_close_round();
        let mut sim = BoutSim::new("bout-1", scenario, StdRng::seed_from_u64(1));
        let first_ts = sim.ts_ms();
        sim.tick();
        let second_ts = sim.ts_ms();
        assert!(second_ts > first_ts);
    }
}
