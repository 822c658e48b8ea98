//! Output shapes of the scoring engine (§3 "Round verdict") and the
//! normalisation engine (§4.11).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{EventKind, FighterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Red,
    Blue,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WinnerReason {
    Points,
    LockRocked,
    LockKdFlash,
    LockKdHard,
    LockKdNf,
    LockSubNf,
}

/// Per-fighter impact flags (§3 "Fighter round state").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactFlags {
    pub rocked: bool,
    pub kd_flash: bool,
    pub kd_hard: bool,
    pub kd_nf: bool,
    pub sub_near_finish: bool,
}

impl ImpactFlags {
    /// The protected-event count `p` used for 10-point-must assignment
    /// (§4.8). Momentum-swing never contributes (§9 Open Questions).
    pub fn protected_count(&self) -> u32 {
        [self.rocked, self.kd_flash, self.kd_hard, self.kd_nf, self.sub_near_finish]
            .iter()
            .filter(|f| **f)
            .count() as u32
    }
}

/// The output of one scoring invocation (§3 "Round verdict").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundVerdict {
    pub bout_id: String,
    pub round: u32,
    pub raw_points: BTreeMap<FighterId, f64>,
    pub share_percent: BTreeMap<FighterId, f64>,
    pub impact_flags: BTreeMap<FighterId, ImpactFlags>,
    pub winner: Winner,
    pub winner_reason: WinnerReason,
    pub ten_point_must: BTreeMap<FighterId, u8>,
    /// Per-fighter, per-event-kind summed final points.
    pub breakdown: BTreeMap<FighterId, BTreeMap<EventKind, f64>>,
    pub control_discount_applied: BTreeMap<FighterId, bool>,
}

/// The output of aggregating every round verdict scored so far for a
/// bout into a single fight-level decision (§6 "finalise_fight"): each
/// round's ten-point-must scores are summed per fighter, the same way a
/// human judge's scorecard is totalled after the last round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FightVerdict {
    pub bout_id: String,
    pub rounds_scored: u32,
    pub totals: BTreeMap<FighterId, u32>,
    pub winner: Winner,
}

/// The per-event output of the Normalisation Engine (§4.11).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightBreakdown {
    pub base_weight: f32,
    pub severity_factor: f32,
    pub confidence_factor: f32,
    pub damage: f32,
    pub control: f32,
    pub aggression: f32,
}
