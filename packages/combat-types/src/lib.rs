//! # combat-types
//!
//! Shared data model for the combat-sport event ingestion, fusion, and
//! scoring core.
//!
//! Every pipeline component (stream ingestor, worker manager, temporal
//! smoother, multi-camera fuser, event classifier, event pipeline,
//! harmoniser, scoring engine, stats aggregator, audit log,
//! normalisation engine) depends on the types in this crate instead of
//! on each other's internals. This is the "dedicated event-model
//! package" called for in place of the source system's open-ended,
//! cross-imported attribute dictionaries.
//!
//! ## Modules
//! - [`event`]: the canonical typed `CombatEvent` and its supporting
//!   enums — the twelve-member event-type namespace.
//! - [`ingress`]: pre-validation shapes (`Frame`, `RawCvInput`,
//!   `JudgeEventInput`) that enter at the edge of the system.
//! - [`harmonize`]: conflict classification and the harmonised-event
//!   shape produced by the Harmonizer.
//! - [`verdict`]: the scoring engine's `RoundVerdict` and the
//!   normalisation engine's `WeightBreakdown`.
//! - [`audit`]: the shape of one hash-chained audit entry.

pub mod audit;
pub mod event;
pub mod harmonize;
pub mod ingress;
pub mod verdict;

pub use audit::{Actor, AuditEventKind, AuditMetadata, AuditRecord, GENESIS_HASH};
pub use event::{
    CombatEvent, ControlKind, EventHeader, EventKind, EventSource, FighterId, GroundStrikeQuality,
    SubmissionDepth, Technique,
};
pub use harmonize::{ConflictType, HarmonizedEvent, HarmonizerStats, ResolutionStrategy};
pub use ingress::{ActionLabel, Aspect, Frame, ImpactTier, JudgeEventInput, Keypoint, RawCvInput};
pub use verdict::{FightVerdict, ImpactFlags, RoundVerdict, WeightBreakdown, Winner, WinnerReason};
