//! # ingress
//!
//! Validates a raw `JudgeEventInput` submission into a canonical
//! `CombatEvent` (§6 "judge_event" ingress contract, §7 "Malformed
//! input"). The twelve-type event namespace is closed and has no
//! catch-all variant, so — unlike the softer "best-effort slug"
//! handling §7 describes for unrecognised types — an `event_type` this
//! crate doesn't recognise is rejected here rather than admitted with a
//! zero base value; there is no slot in `CombatEvent` for it to occupy.
//! Missing or out-of-range metadata fields are rejected the same way.

use combat_types::{
    CombatEvent, ControlKind, EventHeader, EventSource, FighterId, JudgeEventInput, SubmissionDepth, Technique,
};

use crate::error::IngressError;

fn metadata_f32(input: &JudgeEventInput, field: &'static str) -> Result<f32, IngressError> {
    input
        .metadata
        .get(field)
        .and_then(|v| v.as_f64())
        .map(|v| v as f32)
        .ok_or(IngressError::MissingField { field })
}

fn unit_interval(field: &'static str, value: f32) -> Result<f32, IngressError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(IngressError::OutOfRange { field, value: value.to_string(), expected: "0.0..=1.0" })
    }
}

fn metadata_str(input: &JudgeEventInput, field: &'static str) -> Result<&str, IngressError> {
    input.metadata.get(field).and_then(|v| v.as_str()).ok_or(IngressError::MissingField { field })
}

fn parse_technique(raw: &str) -> Result<Technique, IngressError> {
    match raw {
        "jab" => Ok(Technique::Jab),
        "cross" => Ok(Technique::Cross),
        "hook" => Ok(Technique::Hook),
        "uppercut" => Ok(Technique::Uppercut),
        "kick" => Ok(Technique::Kick),
        "elbow" => Ok(Technique::Elbow),
        "knee" => Ok(Technique::Knee),
        other => Err(IngressError::OutOfRange {
            field: "technique",
            value: other.to_string(),
            expected: "jab|cross|hook|uppercut|kick|elbow|knee",
        }),
    }
}

fn parse_submission_depth(raw: &str) -> Result<SubmissionDepth, IngressError> {
    match raw {
        "light" => Ok(SubmissionDepth::Light),
        "deep" => Ok(SubmissionDepth::Deep),
        "near-finish" => Ok(SubmissionDepth::NearFinish),
        other => Err(IngressError::OutOfRange {
            field: "depth",
            value: other.to_string(),
            expected: "light|deep|near-finish",
        }),
    }
}

fn parse_control_kind(raw: &str) -> Result<ControlKind, IngressError> {
    match raw {
        "top" => Ok(ControlKind::Top),
        "back" => Ok(ControlKind::Back),
        "cage" => Ok(ControlKind::Cage),
        other => {
            Err(IngressError::OutOfRange { field: "kind", value: other.to_string(), expected: "top|back|cage" })
        }
    }
}

fn header(event_id: String, input: &JudgeEventInput, fighter: FighterId) -> EventHeader {
    let mut header = EventHeader::new(event_id, input.bout_id.clone(), input.round, fighter, input.ts_ms, 1.0, EventSource::ManualOperator);
    header.extra.insert("device_role".to_string(), serde_json::Value::String(input.device_role.clone()));
    header
}

/// Validates and converts one judge submission. `event_id` is supplied
/// by the caller (the composition root mints a fresh id per
/// submission, typically a `uuid::Uuid::new_v4()`).
pub fn validate_judge_event(event_id: String, input: JudgeEventInput) -> Result<CombatEvent, IngressError> {
    let fighter = input.fighter;
    let hdr = header(event_id, &input, fighter);

    match input.event_type.as_str() {
        "strike-significant" => {
            let technique = parse_technique(metadata_str(&input, "technique")?)?;
            let severity = unit_interval("severity", metadata_f32(&input, "severity")?)?;
            Ok(CombatEvent::StrikeSignificant { header: hdr, technique, severity })
        }
        "strike-high-impact" => {
            let technique = parse_technique(metadata_str(&input, "technique")?)?;
            let severity = unit_interval("severity", metadata_f32(&input, "severity")?)?;
            Ok(CombatEvent::StrikeHighImpact { header: hdr, technique, severity })
        }
        "knockdown-flash" => {
            Ok(CombatEvent::KnockdownFlash { header: hdr, severity: unit_interval("severity", metadata_f32(&input, "severity")?)? })
        }
        "knockdown-hard" => {
            Ok(CombatEvent::KnockdownHard { header: hdr, severity: unit_interval("severity", metadata_f32(&input, "severity")?)? })
        }
        "knockdown-near-finish" => Ok(CombatEvent::KnockdownNearFinish {
            header: hdr,
            severity: unit_interval("severity", metadata_f32(&input, "severity")?)?,
        }),
        "rocked" => {
            Ok(CombatEvent::Rocked { header: hdr, severity: unit_interval("severity", metadata_f32(&input, "severity")?)? })
        }
        "takedown-attempt" => Ok(CombatEvent::TakedownAttempt { header: hdr }),
        "takedown-landed" => Ok(CombatEvent::TakedownLanded { header: hdr }),
        "submission-attempt" => {
            let depth = parse_submission_depth(metadata_str(&input, "depth")?)?;
            Ok(CombatEvent::SubmissionAttempt { header: hdr, depth })
        }
        "control-start" => {
            let kind = parse_control_kind(metadata_str(&input, "kind")?)?;
            Ok(CombatEvent::ControlStart { header: hdr, kind })
        }
        "control-end" => {
            let kind = parse_control_kind(metadata_str(&input, "kind")?)?;
            Ok(CombatEvent::ControlEnd { header: hdr, kind })
        }
        "momentum-swing" => {
            Ok(CombatEvent::MomentumSwing { header: hdr, severity: unit_interval("severity", metadata_f32(&input, "severity")?)? })
        }
        other => Err(IngressError::UnknownEventType { event_type: other.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::Aspect;

    fn input(event_type: &str, metadata: serde_json::Map<String, serde_json::Value>) -> JudgeEventInput {
        JudgeEventInput {
            bout_id: "bout-1".to_string(),
            round: 1,
            fighter: FighterId::Red,
            aspect: Aspect::Striking,
            event_type: event_type.to_string(),
            device_role: "judge-1".to_string(),
            ts_ms: 1_000,
            metadata,
        }
    }

    #[test]
    fn valid_strike_significant_round_trips_into_a_combat_event() {
        let mut meta = serde_json::Map::new();
        meta.insert("technique".to_string(), "cross".into());
        meta.insert("severity".to_string(), 0.8.into());
        let event = validate_judge_event("e-1".to_string(), input("strike-significant", meta)).unwrap();
        assert!(matches!(event, CombatEvent::StrikeSignificant { technique: Technique::Cross, .. }));
    }

    #[test]
    fn missing_required_metadata_field_is_rejected() {
        let err = validate_judge_event("e-1".to_string(), input("strike-significant", serde_json::Map::new()));
        assert!(matches!(err, Err(IngressError::MissingField { field: "technique" })));
    }

    #[test]
    fn out_of_range_severity_is_rejected() {
        let mut meta = serde_json::Map::new();
        meta.insert("technique".to_string(), "jab".into());
        meta.insert("severity".to_string(), 1.5.into());
        let err = validate_judge_event("e-1".to_string(), input("strike-significant", meta));
        assert!(matches!(err, Err(IngressError::OutOfRange { field: "severity", .. })));
    }

    #[test]
    fn unknown_event_type_is_rejected_not_slugged() {
        let err = validate_judge_event("e-1".to_string(), input("spinning-backfist", serde_json::Map::new()));
        assert!(matches!(err, Err(IngressError::UnknownEventType { .. })));
    }

    #[test]
    fn takedown_events_need_no_metadata() {
        let event = validate_judge_event("e-1".to_string(), input("takedown-landed", serde_json::Map::new())).unwrap();
        assert!(matches!(event, CombatEvent::TakedownLanded { .. }));
    }

    #[test]
    fn control_events_parse_kind_from_metadata() {
        let mut meta = serde_json::Map::new();
        meta.insert("kind".to_string(), "cage".into());
        let event = validate_judge_event("e-1".to_string(), input("control-start", meta)).unwrap();
        assert!(matches!(event, CombatEvent::ControlStart { kind: ControlKind::Cage, .. }));
    }
}
