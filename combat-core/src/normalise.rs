//! # normalise
//!
//! Normalisation Engine (§4.11): maps a typed event to a
//! `{damage, control, aggression}` weight bundle. Starts from a
//! per-type base weight, multiplies by a severity factor and a
//! confidence factor, and keeps the breakdown alongside the totals so
//! downstream consumers can inspect why a weight was what it was.
//! No close `original_source` file was retrieved for this component
//! (DESIGN.md); grounded directly on spec.md §4.11's formula, reusing
//! `Technique::base_points()` for the striking base weights so the two
//! engines agree on what a technique is worth.

use combat_types::{CombatEvent, Technique, WeightBreakdown};

/// Which axis a given event type's base weight lands on. Each event
/// type has exactly one dominant axis (§4.11 names a single "per-type
/// base weight", not three).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Damage,
    Control,
    Aggression,
}

fn base_weight(event: &CombatEvent) -> (Axis, f64) {
    match event {
        CombatEvent::StrikeHighImpact { technique, .. } => (Axis::Damage, technique.base_points() as f64),
        CombatEvent::StrikeSignificant { technique, .. } => (Axis::Damage, technique.base_points() as f64 * 2.0),
        CombatEvent::KnockdownFlash { .. } => (Axis::Damage, 40.0),
        CombatEvent::KnockdownHard { .. } => (Axis::Damage, 60.0),
        CombatEvent::KnockdownNearFinish { .. } => (Axis::Damage, 80.0),
        CombatEvent::Rocked { .. } => (Axis::Damage, 25.0),
        CombatEvent::SubmissionAttempt { .. } => (Axis::Damage, 15.0),
        CombatEvent::TakedownLanded { .. } => (Axis::Control, 10.0),
        CombatEvent::ControlStart { .. } | CombatEvent::ControlEnd { .. } => (Axis::Control, 3.0),
        CombatEvent::TakedownAttempt { .. } => (Axis::Aggression, 5.0),
        CombatEvent::MomentumSwing { .. } => (Axis::Damage, 0.0),
    }
}

/// Severity factor: severity² on [0,1]. Variants with no severity
/// field (takedown, control, submission) use the neutral default of
/// 1.0, the same convention the Multi-camera Fuser uses for its
/// consensus score (DESIGN.md "Fusion severity default").
fn severity_factor(event: &CombatEvent) -> f64 {
    let severity = event.severity().unwrap_or(1.0) as f64;
    severity * severity
}

/// Confidence factor: `1 + 0.5 * max(0, confidence - 0.7)`.
fn confidence_factor(confidence: f32) -> f64 {
    1.0 + 0.5 * (confidence as f64 - 0.7).max(0.0)
}

pub struct NormalisationEngine;

impl NormalisationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Computes the weight bundle for a single event.
    pub fn normalise(&self, event: &CombatEvent) -> WeightBreakdown {
        let (axis, base) = base_weight(event);
        let severity_factor = severity_factor(event);
        let confidence_factor = confidence_factor(event.header().confidence);
        let weighted = base * severity_factor * confidence_factor;

        let (damage, control, aggression) = match axis {
            Axis::Damage => (weighted, 0.0, 0.0),
            Axis::Control => (0.0, weighted, 0.0),
            Axis::Aggression => (0.0, 0.0, weighted),
        };

        WeightBreakdown {
            base_weight: base as f32,
            severity_factor: severity_factor as f32,
            confidence_factor: confidence_factor as f32,
            damage: damage as f32,
            control: control as f32,
            aggression: aggression as f32,
        }
    }
}

impl Default for NormalisationEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::{EventHeader, EventSource, FighterId};

    fn header(confidence: f32) -> EventHeader {
        EventHeader::new("e-1", "bout-1", 1, FighterId::Red, 0, confidence, EventSource::CvSystem)
    }

    #[test]
    fn high_impact_cross_weighs_only_the_damage_axis() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::StrikeHighImpact { header: header(0.9), technique: Technique::Cross, severity: 1.0 };
        let breakdown = engine.normalise(&event);
        assert_eq!(breakdown.base_weight, 3.0);
        assert_eq!(breakdown.control, 0.0);
        assert_eq!(breakdown.aggression, 0.0);
        assert!(breakdown.damage > 0.0);
    }

    #[test]
    fn severity_factor_is_the_square_of_severity() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::StrikeHighImpact { header: header(0.7), technique: Technique::Jab, severity: 0.5 };
        let breakdown = engine.normalise(&event);
        assert!((breakdown.severity_factor - 0.25).abs() < 1e-5);
    }

    #[test]
    fn confidence_below_threshold_applies_no_bonus() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::StrikeHighImpact { header: header(0.6), technique: Technique::Jab, severity: 1.0 };
        let breakdown = engine.normalise(&event);
        assert_eq!(breakdown.confidence_factor, 1.0);
    }

    #[test]
    fn confidence_above_threshold_applies_proportional_bonus() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::StrikeHighImpact { header: header(0.9), technique: Technique::Jab, severity: 1.0 };
        let breakdown = engine.normalise(&event);
        assert!((breakdown.confidence_factor - 1.1).abs() < 1e-5);
    }

    #[test]
    fn control_events_weigh_only_the_control_axis_with_neutral_severity() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::ControlStart { header: header(0.8), kind: combat_types::ControlKind::Top };
        let breakdown = engine.normalise(&event);
        assert_eq!(breakdown.severity_factor, 1.0);
        assert_eq!(breakdown.damage, 0.0);
        assert_eq!(breakdown.aggression, 0.0);
        assert!(breakdown.control > 0.0);
    }

    #[test]
    fn takedown_attempt_weighs_only_the_aggression_axis() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::TakedownAttempt { header: header(0.8) };
        let breakdown = engine.normalise(&event);
        assert_eq!(breakdown.damage, 0.0);
        assert_eq!(breakdown.control, 0.0);
        assert!(breakdown.aggression > 0.0);
    }

    #[test]
    fn momentum_swing_carries_zero_weight_on_every_axis() {
        let engine = NormalisationEngine::new();
        let event = CombatEvent::MomentumSwing { header: header(0.8), severity: 0.9 };
        let breakdown = engine.normalise(&event);
        assert_eq!(breakdown.damage, 0.0);
        assert_eq!(breakdown.control, 0.0);
        assert_eq!(breakdown.aggression, 0.0);
    }
}
