//! scenarios.rs — Scripted combat scenarios for the event generator
//!
//! Each scenario biases the fighter state machine toward a specific
//! round shape, analogous to the teacher simulator's injectable fault
//! scenarios. These drive manual verification of the Scoring Engine
//! and Stats Aggregator end to end without needing a live CV worker or
//! camera feed (§1 "Determinism & replay tooling").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScenarioKind {
    /// One fighter lands significantly more volume and control than
    /// the other; the round should score a clear 10-9 or 10-8.
    DominantRound,
    /// Roughly even volume between both fighters; the round should
    /// land near the draw threshold.
    CloseRound,
    /// A knockdown lands partway through the round — exercises the
    /// impact-lock override (§4.8).
    KnockdownFinish,
    /// Heavy top control with sparse striking — exercises R3's control
    /// continuity split and R4's control-without-work guardrail.
    ControlHeavy,
    /// Low-confidence, high-noise CV detections — exercises the Event
    /// Pipeline's confidence gate and the Temporal Smoother.
    NoisyLowConfidence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub kind: ScenarioKind,
    /// Fighter favoured by `DominantRound`/`KnockdownFinish`/`ControlHeavy`.
    pub favoured: combat_types::FighterId,
    /// Mean CV detection confidence away from `NoisyLowConfidence`'s floor.
    pub base_confidence: f32,
    /// Ticks per round at the configured tick rate.
    pub ticks_per_round: u32,
    /// Seconds of wall-clock time represented by one tick.
    pub tick_duration_sec: f64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            kind: ScenarioKind::CloseRound,
            favoured: combat_types::FighterId::Red,
            base_confidence: 0.9,
            ticks_per_round: 150,
            tick_duration_sec: 2.0,
        }
    }
}

pub fn preset_dominant_round(favoured: combat_types::FighterId) -> ScenarioConfig {
    ScenarioConfig { kind: ScenarioKind::DominantRound, favoured, ..Default::default() }
}

pub fn preset_close_round() -> ScenarioConfig {
    ScenarioConfig { kind: ScenarioKind::CloseRound, ..Default::default() }
}

pub fn preset_knockdown_finish(favoured: combat_types::FighterId) -> ScenarioConfig {
    ScenarioConfig { kind: ScenarioKind::KnockdownFinish, favoured, ..Default::default() }
}

pub fn preset_control_heavy(favoured: combat_types::FighterId) -> ScenarioConfig {
    ScenarioConfig { kind: ScenarioKind::ControlHeavy, favoured, ..Default::default() }
}

pub fn preset_noisy_low_confidence() -> ScenarioConfig {
    ScenarioConfig { kind: ScenarioKind::NoisyLowConfidence, base_confidence: 0.5, ..Default::default() }
}

pub fn by_name(name: &str, favoured: combat_types::FighterId) -> Option<ScenarioConfig> {
    match name {
        "dominant-round" => Some(preset_dominant_round(favoured)),
        "close-round" => Some(preset_close_round()),
        "knockdown-finish" => Some(preset_knockdown_finish(favoured)),
        "control-heavy" => Some(preset_control_heavy(favoured)),
        "noisy-low-confidence" => Some(preset_noisy_low_confidence()),
        _ => None,
    }
}
