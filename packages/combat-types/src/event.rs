//! The canonical typed event model (§3 "Combat event").
//!
//! Every component in the pipeline depends on this module instead of on
//! each other — this is the "dedicated event-model package" called for
//! in place of the source's open-ended per-event attribute maps. One
//! variant per event type, each holding only the fields relevant to it,
//! behind a narrow shared header.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One of the two fighters in a bout. Corresponds to the ingress
/// `corner` field (RED/BLUE) — there is no separate notion of "corner"
/// once an event has entered the canonical model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FighterId {
    Red,
    Blue,
}

impl FighterId {
    pub fn opponent(self) -> FighterId {
        match self {
            FighterId::Red => FighterId::Blue,
            FighterId::Blue => FighterId::Red,
        }
    }
}

impl std::fmt::Display for FighterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FighterId::Red => write!(f, "RED"),
            FighterId::Blue => write!(f, "BLUE"),
        }
    }
}

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventSource {
    ManualOperator,
    CvSystem,
    AnalyticsDerived,
}

/// Striking sub-technique. CV input only distinguishes coarse action
/// labels (punch/kick/knee/elbow — see `ingress::ActionLabel`); the
/// finer-grained technique used for per-technique base values is either
/// supplied directly by a judge event or inferred by the classifier
/// from the coarse action label (`Technique::from_action_label`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    Jab,
    Cross,
    Hook,
    Uppercut,
    Kick,
    Elbow,
    Knee,
}

impl Technique {
    /// Base point value for the strike-high-impact tier of this
    /// technique (§4.8). The strike-significant variant doubles this.
    pub fn base_points(self) -> u32 {
        match self {
            Technique::Jab => 1,
            Technique::Cross | Technique::Hook | Technique::Uppercut => 3,
            Technique::Kick => 4,
            Technique::Elbow | Technique::Knee => 5,
        }
    }

    /// Default technique for a CV-observed coarse action label, used
    /// when no judge-supplied technique is available. `punch` defaults
    /// to `Cross`, the modal punch; `Jab`/`Hook`/`Uppercut` are only
    /// ever judge-specified.
    pub fn from_action_label(action: crate::ingress::ActionLabel) -> Option<Technique> {
        use crate::ingress::ActionLabel;
        match action {
            ActionLabel::Punch => Some(Technique::Cross),
            ActionLabel::Kick => Some(Technique::Kick),
            ActionLabel::Knee => Some(Technique::Knee),
            ActionLabel::Elbow => Some(Technique::Elbow),
            _ => None,
        }
    }
}

/// Depth of a submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionDepth {
    Light,
    Deep,
    NearFinish,
}

/// Kind of positional control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlKind {
    Top,
    Back,
    Cage,
}

/// Egress label for a strike landed while a control window is active
/// (ground-and-pound). Not carried on `CombatEvent` itself — derived by
/// the scoring engine from whether a strike falls inside an active
/// control window, and exposed to clients as this label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroundStrikeQuality {
    Light,
    Solid,
}

/// Data-less tag identifying one of the twelve event types in the
/// stable event-type namespace (§6). Used for dedup fingerprints,
/// fusion grouping, and per-event-kind breakdowns where the
/// type-specific payload of `CombatEvent` isn't needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    StrikeSignificant,
    StrikeHighImpact,
    KnockdownFlash,
    KnockdownHard,
    KnockdownNearFinish,
    Rocked,
    TakedownAttempt,
    TakedownLanded,
    SubmissionAttempt,
    ControlStart,
    ControlEnd,
    MomentumSwing,
}

impl EventKind {
    /// Whether this kind is one of the five impact-lock / 10-8
    /// protected flags (§3 Round verdict, §4.8).
    pub fn is_protected(self) -> bool {
        matches!(
            self,
            EventKind::Rocked
                | EventKind::KnockdownFlash
                | EventKind::KnockdownHard
                | EventKind::KnockdownNearFinish
        )
        // submission-near-finish is protected too, but that is carried
        // on the SubmissionAttempt payload (depth), not the kind alone —
        // see `CombatEvent::is_protected`.
    }
}

/// Fields shared by every event variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventHeader {
    /// Opaque id, unique within the bout. Assigned at ingress.
    pub event_id: String,
    pub bout_id: String,
    pub round: u32,
    pub fighter: FighterId,
    /// Milliseconds since a fixed epoch agreed for the bout (§9
    /// "Timestamp heterogeneity" — normalised once at ingress).
    pub ts_ms: i64,
    pub confidence: f32,
    pub source: EventSource,
    pub camera_id: Option<String>,
    pub camera_angle_deg: Option<f32>,
    /// Set true on the single event that survives multi-camera fusion.
    #[serde(default)]
    pub canonical: bool,
    /// Bounded extension map for attributes a legacy input carried that
    /// have no dedicated field here (§9 re-architecture note).
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EventHeader {
    pub fn new(
        event_id: impl Into<String>,
        bout_id: impl Into<String>,
        round: u32,
        fighter: FighterId,
        ts_ms: i64,
        confidence: f32,
        source: EventSource,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            bout_id: bout_id.into(),
            round,
            fighter,
            ts_ms,
            confidence,
            source,
            camera_id: None,
            camera_angle_deg: None,
            canonical: false,
            extra: BTreeMap::new(),
        }
    }
}

/// The canonical typed event (§3 "Combat event"). Severity and
/// confidence both live in [0,1]; confidence is on the shared header,
/// severity is per-variant since not every kind computes severity the
/// same way (most strikes/knockdowns carry an explicit severity,
/// control and takedown events do not).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CombatEvent {
    StrikeSignificant { header: EventHeader, technique: Technique, severity: f32 },
    StrikeHighImpact { header: EventHeader, technique: Technique, severity: f32 },
    KnockdownFlash { header: EventHeader, severity: f32 },
    KnockdownHard { header: EventHeader, severity: f32 },
    KnockdownNearFinish { header: EventHeader, severity: f32 },
    Rocked { header: EventHeader, severity: f32 },
    TakedownAttempt { header: EventHeader },
    TakedownLanded { header: EventHeader },
    SubmissionAttempt { header: EventHeader, depth: SubmissionDepth },
    ControlStart { header: EventHeader, kind: ControlKind },
    ControlEnd { header: EventHeader, kind: ControlKind },
    MomentumSwing { header: EventHeader, severity: f32 },
}

impl CombatEvent {
    pub fn header(&self) -> &EventHeader {
        match self {
            CombatEvent::StrikeSignificant { header, .. }
            | CombatEvent::StrikeHighImpact { header, .. }
            | CombatEvent::KnockdownFlash { header, .. }
            | CombatEvent::KnockdownHard { header, .. }
            | CombatEvent::KnockdownNearFinish { header, .. }
            | CombatEvent::Rocked { header, .. }
            | CombatEvent::TakedownAttempt { header }
            | CombatEvent::TakedownLanded { header }
            | CombatEvent::SubmissionAttempt { header, .. }
            | CombatEvent::ControlStart { header, .. }
            | CombatEvent::ControlEnd { header, .. }
            | CombatEvent::MomentumSwing { header, .. } => header,
        }
    }

    pub fn header_mut(&mut self) -> &mut EventHeader {
        match self {
            CombatEvent::StrikeSignificant { header, .. }
            | CombatEvent::StrikeHighImpact { header, .. }
            | CombatEvent::KnockdownFlash { header, .. }
            | CombatEvent::KnockdownHard { header, .. }
            | CombatEvent::KnockdownNearFinish { header, .. }
            | CombatEvent::Rocked { header, .. }
            | CombatEvent::TakedownAttempt { header }
            | CombatEvent::TakedownLanded { header }
            | CombatEvent::SubmissionAttempt { header, .. }
            | CombatEvent::ControlStart { header, .. }
            | CombatEvent::ControlEnd { header, .. }
            | CombatEvent::MomentumSwing { header, .. } => header,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            CombatEvent::StrikeSignificant { .. } => EventKind::StrikeSignificant,
            CombatEvent::StrikeHighImpact { .. } => EventKind::StrikeHighImpact,
            CombatEvent::KnockdownFlash { .. } => EventKind::KnockdownFlash,
            CombatEvent::KnockdownHard { .. } => EventKind::KnockdownHard,
            CombatEvent::KnockdownNearFinish { .. } => EventKind::KnockdownNearFinish,
            CombatEvent::Rocked { .. } => EventKind::Rocked,
            CombatEvent::TakedownAttempt { .. } => EventKind::TakedownAttempt,
            CombatEvent::TakedownLanded { .. } => EventKind::TakedownLanded,
            CombatEvent::SubmissionAttempt { .. } => EventKind::SubmissionAttempt,
            CombatEvent::ControlStart { .. } => EventKind::ControlStart,
            CombatEvent::ControlEnd { .. } => EventKind::ControlEnd,
            CombatEvent::MomentumSwing { .. } => EventKind::MomentumSwing,
        }
    }

    pub fn fighter(&self) -> FighterId {
        self.header().fighter
    }

    pub fn event_id(&self) -> &str {
        &self.header().event_id
    }

    pub fn ts_ms(&self) -> i64 {
        self.header().ts_ms
    }

    /// Severity in [0,1], where defined (§3). Events with no notion of
    /// severity (takedowns, control, submission) report `None`.
    pub fn severity(&self) -> Option<f32> {
        match self {
            CombatEvent::StrikeSignificant { severity, .. }
            | CombatEvent::StrikeHighImpact { severity, .. }
            | CombatEvent::KnockdownFlash { severity, .. }
            | CombatEvent::KnockdownHard { severity, .. }
            | CombatEvent::KnockdownNearFinish { severity, .. }
            | CombatEvent::Rocked { severity, .. }
            | CombatEvent::MomentumSwing { severity, .. } => Some(*severity),
            _ => None,
        }
    }

    /// Whether this event counts toward the protected-event count `p`
    /// used for 10-point-must assignment (§4.8, §3). Momentum-swing is
    /// explicitly excluded (§9 Open Questions).
    pub fn is_protected(&self) -> bool {
        match self {
            CombatEvent::SubmissionAttempt { depth, .. } => *depth == SubmissionDepth::NearFinish,
            other => other.kind().is_protected(),
        }
    }

    /// Overwrites severity in place for variants that carry one;
    /// no-op for variants with no severity field (used by the
    /// Harmonizer's weighted/hybrid resolution strategies).
    pub fn set_severity(&mut self, value: f32) {
        match self {
            CombatEvent::StrikeSignificant { severity, .. }
            | CombatEvent::StrikeHighImpact { severity, .. }
            | CombatEvent::KnockdownFlash { severity, .. }
            | CombatEvent::KnockdownHard { severity, .. }
            | CombatEvent::KnockdownNearFinish { severity, .. }
            | CombatEvent::Rocked { severity, .. }
            | CombatEvent::MomentumSwing { severity, .. } => *severity = value,
            _ => {}
        }
    }
}
