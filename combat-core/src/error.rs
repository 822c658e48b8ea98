//! # error
//!
//! Typed errors at every component boundary (§4.13, §7). One
//! `thiserror`-derived enum per component, each variant carrying enough
//! structured context to log usefully without string-formatting at the
//! call site. `anyhow` is reserved for the composition root.
//!
//! Outcomes the design classifies as "non-error" — a dedup hit, a
//! confidence-gate miss, no worker available — are never `Result::Err`.
//! They are plain enums a caller inspects, so they cannot accidentally
//! propagate with `?` as if something had gone wrong.

use thiserror::Error;

/// Why an event was rejected at the Event Pipeline (§4.6). Not an
/// error: rejection is an expected, common outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Duplicate,
    Confidence,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Duplicate => write!(f, "duplicate"),
            RejectReason::Confidence => write!(f, "confidence"),
        }
    }
}

/// Outcome of submitting one event to the pipeline's dedup+gate stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Accepted,
    Rejected(RejectReason),
}

impl GateOutcome {
    pub fn is_accepted(self) -> bool {
        matches!(self, GateOutcome::Accepted)
    }
}

/// Ingress validation failures (§7 "Malformed input"). These ARE real
/// errors: a malformed submission never enters the pipeline.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("judge event missing required field `{field}`")]
    MissingField { field: &'static str },
    #[error("value `{value}` out of range for `{field}` (expected {expected})")]
    OutOfRange { field: &'static str, value: String, expected: &'static str },
    #[error("unrecognised event type `{event_type}`")]
    UnknownEventType { event_type: String },
}

/// Stream Ingestor faults (§4.1). Transport errors never propagate past
/// this boundary — a feed just goes inactive — so this type exists for
/// the operations that *can* legitimately fail outright (add-stream).
#[derive(Debug, Error)]
pub enum IngestorError {
    #[error("camera `{camera_id}` is already registered")]
    DuplicateCamera { camera_id: String },
    #[error("no such camera `{camera_id}`")]
    UnknownCamera { camera_id: String },
}

/// Worker Manager faults (§4.2).
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("no such worker `{worker_id}`")]
    UnknownWorker { worker_id: String },
}

/// Audit Log faults (§4.10, §7).
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("could not open audit mirror file for bout `{bout_id}`: {source}")]
    MirrorUnavailable { bout_id: String, #[source] source: std::io::Error },
    #[error(
        "audit chain for bout `{bout_id}` broken at sequence {seq}: expected hash `{expected}`, found `{found}`"
    )]
    ChainBroken { bout_id: String, seq: u64, expected: String, found: String },
}

/// Scoring Engine faults (§4.8, §7). A scoring invariant violation is
/// fatal: the verdict is withheld rather than emitted inconsistent.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error(
        "invariant violated for event `{event_id}`: final points {actual} != base * multipliers {expected}"
    )]
    InvariantViolation { event_id: String, expected: f64, actual: f64 },
}

/// Errors surfaced while verifying or appending to a bout's chain that
/// aren't hash-mismatch faults (those are `AuditError::ChainBroken`).
#[derive(Debug, Error)]
pub enum HarmonizerError {
    #[error("conflict analysis requested with no candidate event")]
    NoCandidate,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// §4.13, §8: dedup hit and confidence-gate miss must not be
    /// constructible as `Err` — they are plain values, not a `Result`.
    #[test]
    fn gate_outcomes_are_not_results() {
        let rejected: GateOutcome = GateOutcome::Rejected(RejectReason::Duplicate);
        assert!(!rejected.is_accepted());
        let accepted: GateOutcome = GateOutcome::Accepted;
        assert!(accepted.is_accepted());
    }

    #[test]
    fn reject_reason_displays_matching_wire_labels() {
        assert_eq!(RejectReason::Duplicate.to_string(), "duplicate");
        assert_eq!(RejectReason::Confidence.to_string(), "confidence");
    }
}
