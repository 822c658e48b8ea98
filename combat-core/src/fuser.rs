//! # fuser
//!
//! Multi-camera Fuser (§4.4). Collapses near-simultaneous detections of
//! the same action from multiple cameras into one canonical event.
//! Grounded on
//! `original_source/backend/cv_analytics/multicam_fusion.py`.

use combat_types::CombatEvent;

use crate::config::FusionConfig;

pub struct MultiCameraFuser {
    config: FusionConfig,
}

impl MultiCameraFuser {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    /// Fuses a batch of events using time-window grouping and
    /// consensus scoring. Idempotent: fusing an already-fused stream
    /// (all singleton classes) returns it unchanged (§8).
    pub fn fuse_events(&self, events: Vec<CombatEvent>) -> Vec<CombatEvent> {
        if events.is_empty() {
            return events;
        }

        let mut sorted = events;
        sorted.sort_by_key(|e| e.ts_ms());

        let groups = self.group_by_time_window(sorted);

        groups
            .into_iter()
            .map(|group| {
                if group.len() == 1 {
                    let mut only = group;
                    only.pop().unwrap()
                } else {
                    self.apply_consensus_fusion(group)
                }
            })
            .collect()
    }

    fn group_by_time_window(&self, events: Vec<CombatEvent>) -> Vec<Vec<CombatEvent>> {
        let mut groups: Vec<Vec<CombatEvent>> = Vec::new();
        let mut current: Vec<CombatEvent> = vec![];

        for event in events {
            if current.is_empty() {
                current.push(event);
                continue;
            }
            let anchor = &current[0];
            let time_diff = event.ts_ms() - anchor.ts_ms();
            if time_diff < self.config.window_ms && events_similar(&event, anchor) {
                current.push(event);
            } else {
                groups.push(std::mem::take(&mut current));
                current.push(event);
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }
        groups
    }

    fn apply_consensus_fusion(&self, group: Vec<CombatEvent>) -> CombatEvent {
        let n = group.len() as f32;
        let mean_confidence: f32 = group.iter().map(|e| e.header().confidence).sum::<f32>() / n;

        let (best_idx, _) = group
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e.header().confidence * e.severity().unwrap_or(1.0) * angle_weight(e.header().camera_angle_deg)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .unwrap();

        let mut canonical = group.into_iter().nth(best_idx).unwrap();
        let camera_count = n as i64;
        {
            let header = canonical.header_mut();
            header.canonical = true;
            header.confidence = mean_confidence;
            header.extra.insert("camera_count".to_string(), serde_json::json!(camera_count));
        }
        canonical
    }
}

fn events_similar(a: &CombatEvent, b: &CombatEvent) -> bool {
    a.fighter() == b.fighter() && a.kind() == b.kind()
}

fn angle_weight(angle_deg: Option<f32>) -> f32 {
    let Some(angle) = angle_deg else {
        return 0.8;
    };
    let angle = angle.rem_euclid(360.0);
    if (45.0..=135.0).contains(&angle) || (225.0..=315.0).contains(&angle) {
        1.0
    } else {
        0.7
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::{EventHeader, EventSource, FighterId};

    fn strike(ts_ms: i64, confidence: f32, severity: f32, angle: Option<f32>) -> CombatEvent {
        let mut header =
            EventHeader::new("e", "bout-1", 1, FighterId::Red, ts_ms, confidence, EventSource::CvSystem);
        header.camera_angle_deg = angle;
        CombatEvent::StrikeHighImpact { header, technique: combat_types::Technique::Cross, severity }
    }

    #[test]
    fn empty_input_returns_empty() {
        let fuser = MultiCameraFuser::new(FusionConfig::default());
        assert!(fuser.fuse_events(vec![]).is_empty());
    }

    #[test]
    fn singleton_passes_through_unchanged() {
        let fuser = MultiCameraFuser::new(FusionConfig::default());
        let out = fuser.fuse_events(vec![strike(0, 0.9, 0.8, Some(0.0))]);
        assert_eq!(out.len(), 1);
        assert!(!out[0].header().canonical);
    }

    #[test]
    fn three_camera_group_fuses_to_one_canonical_with_mean_confidence() {
        let fuser = MultiCameraFuser::new(FusionConfig::default());
        let events = vec![
            strike(1000, 0.85, 0.8, Some(0.0)),
            strike(1010, 0.88, 0.8, Some(120.0)),
            strike(1020, 0.91, 0.8, Some(240.0)),
        ];
        let out = fuser.fuse_events(events);
        assert_eq!(out.len(), 1);
        assert!(out[0].header().canonical);
        assert!((out[0].header().confidence - 0.88).abs() < 1e-4);
    }

    #[test]
    fn fusing_an_already_fused_stream_is_idempotent() {
        let fuser = MultiCameraFuser::new(FusionConfig::default());
        let once = fuser.fuse_events(vec![
            strike(1000, 0.85, 0.8, Some(0.0)),
            strike(1010, 0.88, 0.8, Some(120.0)),
        ]);
        let twice = fuser.fuse_events(once.clone());
        assert_eq!(once.len(), twice.len());
        assert_eq!(once[0].header().confidence, twice[0].header().confidence);
    }

    #[test]
    fn different_fighters_are_not_grouped() {
        let fuser = MultiCameraFuser::new(FusionConfig::default());
        let mut b = strike(1010, 0.9, 0.8, None);
        b.header_mut().fighter = FighterId::Blue;
        let out = fuser.fuse_events(vec![strike(1000, 0.9, 0.8, None), b]);
        assert_eq!(out.len(), 2);
    }
}
