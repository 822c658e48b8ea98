//! # smoother
//!
//! Temporal Smoother (§4.3). Suppresses noisy single-frame CV
//! detections with a rolling consistency/confidence/optical-flow gate.
//! Grounded on
//! `original_source/backend/cv_analytics/temporal_smoothing.py`.

use std::collections::{HashMap, VecDeque};

use combat_types::{ActionLabel, ImpactTier, RawCvInput};

use crate::config::SmootherConfig;

/// Per-stream rolling window. One instance per camera feed — state is
/// not restartable without losing `window_frames - 1` frames of warm-up
/// (§4.3).
pub struct TemporalSmoother {
    config: SmootherConfig,
    window: VecDeque<RawCvInput>,
}

impl TemporalSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self { config, window: VecDeque::with_capacity(config.window_frames) }
    }

    /// Pushes one raw input into the window and returns a smoothed
    /// input if the window passes the consistency, confidence, and
    /// optical-flow gates; `None` otherwise.
    pub fn smooth(&mut self, input: RawCvInput) -> Option<RawCvInput> {
        self.window.push_back(input);
        while self.window.len() > self.config.window_frames {
            self.window.pop_front();
        }
        if self.window.len() < self.config.window_frames {
            return None;
        }

        let mut counts: HashMap<ActionLabel, u32> = HashMap::new();
        for frame in &self.window {
            *counts.entry(frame.action).or_insert(0) += 1;
        }
        let (most_common, count) = counts.into_iter().max_by_key(|(_, c)| *c)?;
        let consistency = count as f32 / self.config.window_frames as f32;
        if consistency < self.config.consistency {
            return None;
        }

        let latest = self.window.back()?;
        if !self.validate_optical_flow(latest) {
            return None;
        }

        let avg_confidence: f32 = self.window.iter().map(|f| f.top1_confidence()).sum::<f32>()
            / self.window.len() as f32;
        if avg_confidence < self.config.confidence_floor {
            return None;
        }

        let mut smoothed = latest.clone();
        smoothed.action = most_common;
        for v in smoothed.action_confidences.values_mut() {
            *v = avg_confidence;
        }
        Some(smoothed)
    }

    fn validate_optical_flow(&self, input: &RawCvInput) -> bool {
        let Some(magnitude) = input.flow_magnitude else {
            return true;
        };
        if input.impact_detected && matches!(input.impact_tier, ImpactTier::Heavy | ImpactTier::Critical) {
            return magnitude > self.config.flow_threshold;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::FighterId;
    use std::collections::BTreeMap;

    fn input(action: ActionLabel, confidence: f32, tier: ImpactTier, flow: Option<f32>) -> RawCvInput {
        let mut confidences = BTreeMap::new();
        confidences.insert(format!("{action:?}"), confidence);
        RawCvInput {
            bout_id: "bout-1".into(),
            round: 1,
            frame_camera_id: "cam-a".into(),
            frame_ts_ms: 0,
            action,
            action_confidences: confidences,
            impact_detected: tier != ImpactTier::Light,
            impact_tier: tier,
            fighter_bbox: [0.0; 4],
            keypoints: [Default::default(); 17],
            flow_magnitude: flow,
            camera_angle_deg: None,
            camera_distance_m: None,
            fighter_id: FighterId::Red,
        }
    }

    #[test]
    fn emits_nothing_until_window_is_full() {
        let mut smoother = TemporalSmoother::new(SmootherConfig::default());
        for _ in 0..4 {
            assert!(smoother.smooth(input(ActionLabel::Punch, 0.9, ImpactTier::Medium, None)).is_none());
        }
    }

    #[test]
    fn emits_once_window_is_full_and_consistent() {
        let mut smoother = TemporalSmoother::new(SmootherConfig::default());
        let mut out = None;
        for _ in 0..5 {
            out = smoother.smooth(input(ActionLabel::Punch, 0.9, ImpactTier::Medium, None));
        }
        assert!(out.is_some());
        assert_eq!(out.unwrap().action, ActionLabel::Punch);
    }

    #[test]
    fn low_consistency_window_is_suppressed() {
        let mut smoother = TemporalSmoother::new(SmootherConfig::default());
        let mut out = None;
        let actions =
            [ActionLabel::Punch, ActionLabel::Kick, ActionLabel::Knee, ActionLabel::Elbow, ActionLabel::Punch];
        for a in actions {
            out = smoother.smooth(input(a, 0.9, ImpactTier::Medium, None));
        }
        assert!(out.is_none());
    }

    #[test]
    fn heavy_impact_without_sufficient_flow_is_suppressed() {
        let mut smoother = TemporalSmoother::new(SmootherConfig::default());
        let mut out = None;
        for _ in 0..5 {
            out = smoother.smooth(input(ActionLabel::Punch, 0.9, ImpactTier::Heavy, Some(1.0)));
        }
        assert!(out.is_none());
    }

    #[test]
    fn heavy_impact_with_sufficient_flow_passes() {
        let mut smoother = TemporalSmoother::new(SmootherConfig::default());
        let mut out = None;
        for _ in 0..5 {
            out = smoother.smooth(input(ActionLabel::Punch, 0.9, ImpactTier::Heavy, Some(5.0)));
        }
        assert!(out.is_some());
    }

    #[test]
    fn low_average_confidence_is_suppressed() {
        let mut smoother = TemporalSmoother::new(SmootherConfig::default());
        let mut out = None;
        for _ in 0..5 {
            out = smoother.smooth(input(ActionLabel::Punch, 0.2, ImpactTier::Medium, None));
        }
        assert!(out.is_none());
    }
}
