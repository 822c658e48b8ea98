//! Ingress-shaped entities (§3 "Frame", "Raw CV input") and the raw
//! judge-event submission shape, before either has been validated and
//! turned into a `CombatEvent`.

use serde::{Deserialize, Serialize};

use crate::event::FighterId;

/// A single image emitted by one camera at a known instant for a known
/// bout. Immutable after emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub bout_id: String,
    pub camera_id: String,
    pub ts_ms: i64,
    /// Opaque image payload; the core never decodes it.
    pub payload: Vec<u8>,
}

/// Coarse action label a CV worker can emit. Finer striking technique
/// (jab/cross/hook/uppercut) is not observable by CV and is left to
/// `Technique::from_action_label`'s default, or to a judge event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionLabel {
    Punch,
    Kick,
    Knee,
    Elbow,
    Takedown,
    Submission,
    Clinch,
    GroundControl,
    Knockdown,
    Standup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImpactTier {
    Light,
    Medium,
    Heavy,
    Critical,
}

/// A 2D keypoint in image space, one of the 17 COCO keypoints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub score: f32,
}

/// The output of one CV worker on one frame (§3 "Raw CV input").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCvInput {
    pub bout_id: String,
    pub round: u32,
    pub frame_camera_id: String,
    pub frame_ts_ms: i64,
    pub action: ActionLabel,
    /// Per-label confidence, as produced by the action-classification
    /// head; `action` is the arg-max of this map.
    pub action_confidences: std::collections::BTreeMap<String, f32>,
    pub impact_detected: bool,
    pub impact_tier: ImpactTier,
    /// [x, y, w, h] in image space.
    pub fighter_bbox: [f32; 4],
    pub keypoints: [Keypoint; 17],
    pub flow_magnitude: Option<f32>,
    pub camera_angle_deg: Option<f32>,
    pub camera_distance_m: Option<f32>,
    pub fighter_id: FighterId,
}

impl RawCvInput {
    pub fn top1_confidence(&self) -> f32 {
        self.action_confidences
            .values()
            .copied()
            .fold(0.0_f32, f32::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aspect {
    Striking,
    Grappling,
}

/// What an operator submits from the tablet — a loosely-typed request
/// the ingress layer validates and maps into a `CombatEvent`. Unlike
/// `CombatEvent`, `event_type` is a free string here: unknown types are
/// handled at the ingress per §7, not rejected outright.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeEventInput {
    pub bout_id: String,
    pub round: u32,
    pub fighter: FighterId,
    pub aspect: Aspect,
    pub event_type: String,
    pub device_role: String,
    pub ts_ms: i64,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
