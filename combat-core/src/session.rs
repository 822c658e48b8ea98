//! # session
//!
//! Wires one bout's worth of pipeline stages into the order named by
//! §4.14: smoother → fuser → classifier → pipeline (dedup/gate) →
//! harmonizer → normalisation/scoring/stats/audit. Pulled out of
//! `main` into its own type because every stage but the Harmonizer and
//! Scoring Engine needs `&mut self`, and a composition root that held
//! all of them directly would have to serialise every call through one
//! giant lock; `BoutSession` does that serialisation in one place
//! instead, behind a `tokio::sync::Mutex` per bout.

use std::collections::HashMap;

use combat_types::{CombatEvent, FightVerdict, FighterId, JudgeEventInput, RawCvInput, RoundVerdict, Winner, WeightBreakdown};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::classifier::EventClassifier;
use crate::config::Config;
use crate::error::{IngressError, ScoringError};
use crate::fuser::MultiCameraFuser;
use crate::harmonizer::Harmonizer;
use crate::ingress::validate_judge_event;
use crate::normalise::NormalisationEngine;
use crate::pipeline::EventPipeline;
use crate::scoring::{ScoringDebug, ScoringEngine};
use crate::smoother::TemporalSmoother;
use crate::stats::{ComparisonStats, LiveStats, StatsAggregator};

struct Stages {
    smoothers: HashMap<String, TemporalSmoother>,
    fuser: MultiCameraFuser,
    classifier: EventClassifier,
    pipeline: EventPipeline,
    harmonizer: Harmonizer,
}

/// One bout's event log plus the pipeline stages that feed it.
/// Constructed once by the composition root per active bout.
pub struct BoutSession {
    bout_id: String,
    smoother_config: crate::config::SmootherConfig,
    stages: Mutex<Stages>,
    events: Mutex<Vec<CombatEvent>>,
    round_verdicts: Mutex<HashMap<u32, RoundVerdict>>,
    scoring: ScoringEngine,
    stats: Mutex<StatsAggregator>,
    normaliser: NormalisationEngine,
    audit: AuditLogger,
}

impl BoutSession {
    pub fn new(bout_id: impl Into<String>, config: &Config, audit: AuditLogger) -> Self {
        Self {
            bout_id: bout_id.into(),
            smoother_config: config.smoother.clone(),
            stages: Mutex::new(Stages {
                smoothers: HashMap::new(),
                fuser: MultiCameraFuser::new(config.fusion.clone()),
                classifier: EventClassifier::new(config.classifier.clone()),
                pipeline: EventPipeline::new(config.dedup.clone()),
                harmonizer: Harmonizer::new(config.harmoniser.clone()),
            }),
            events: Mutex::new(Vec::new()),
            round_verdicts: Mutex::new(HashMap::new()),
            scoring: ScoringEngine::new(config.scoring.clone()),
            stats: Mutex::new(StatsAggregator::new(config.stats.clone())),
            normaliser: NormalisationEngine::new(),
            audit,
        }
    }

    /// Feeds one raw CV detection (already routed to a worker and
    /// returned by it — the inference step itself is an external
    /// collaborator, §1) through smoothing, classification, fusion,
    /// the dedup/gate, and the Harmonizer. Returns the events accepted
    /// into the bout's canonical log, each paired with its weight
    /// breakdown.
    pub async fn ingest_raw_cv_input(&self, camera_id: &str, input: RawCvInput) -> Vec<(CombatEvent, WeightBreakdown)> {
        let mut stages = self.stages.lock().await;

        let smoother_config = self.smoother_config.clone();
        let smoother = stages
            .smoothers
            .entry(camera_id.to_string())
            .or_insert_with(|| TemporalSmoother::new(smoother_config));
        let Some(smoothed) = smoother.smooth(input) else {
            return Vec::new();
        };

        let candidates = stages.classifier.classify(&smoothed);
        let fused = stages.fuser.fuse_events(candidates);

        let mut accepted = Vec::new();
        for event in fused {
            let outcome = stages.pipeline.admit(&event);
            if !outcome.is_accepted() {
                self.audit.log_event_decision(&self.bout_id, false, event.event_id(), event.ts_ms()).await;
                debug!(bout_id = %self.bout_id, event_id = %event.event_id(), ?outcome, "event rejected at gate");
                continue;
            }

            for harmonized in stages.harmonizer.process_cv_event(event) {
                accepted.push(self.land_event(harmonized.event).await);
            }
        }
        accepted
    }

    /// Validates one raw judge submission (§6 "judge_event", §7
    /// "Malformed input") and, if well-formed, feeds it directly into
    /// the Harmonizer, bypassing smoothing/classification/fusion
    /// (those only apply to CV-sourced input) but not the dedup/gate
    /// stage. A malformed submission never enters the pipeline or the
    /// audit chain.
    pub async fn ingest_judge_event(&self, input: JudgeEventInput) -> Result<Vec<(CombatEvent, WeightBreakdown)>, IngressError> {
        let event_id = uuid::Uuid::new_v4().to_string();
        let event = match validate_judge_event(event_id, input) {
            Ok(event) => event,
            Err(e) => {
                warn!(bout_id = %self.bout_id, error = %e, "judge event rejected at ingress");
                return Err(e);
            }
        };

        let mut stages = self.stages.lock().await;
        let outcome = stages.pipeline.admit(&event);
        if !outcome.is_accepted() {
            self.audit.log_event_decision(&self.bout_id, false, event.event_id(), event.ts_ms()).await;
            return Ok(Vec::new());
        }

        let mut accepted = Vec::new();
        for harmonized in stages.harmonizer.process_judge_event(event) {
            accepted.push(self.land_event(harmonized.event).await);
        }
        Ok(accepted)
    }

    async fn land_event(&self, event: CombatEvent) -> (CombatEvent, WeightBreakdown) {
        self.audit.log_event_decision(&self.bout_id, true, event.event_id(), event.ts_ms()).await;
        let weight = self.normaliser.normalise(&event);
        self.events.lock().await.push(event.clone());
        self.stats.lock().await.invalidate(&self.bout_id);
        (event, weight)
    }

    /// Snapshot of every event accepted into this bout's log so far.
    pub async fn events_snapshot(&self) -> Vec<CombatEvent> {
        self.events.lock().await.clone()
    }

    /// Live per-fighter totals, 1-second-TTL cached (§4.9).
    pub async fn live_stats(&self) -> LiveStats {
        let events = self.events_snapshot().await;
        self.stats.lock().await.live_stats(&self.bout_id, &events).0
    }

    /// Red-vs-blue comparison stats, 1-second-TTL cached (§4.9).
    pub async fn comparison_stats(&self) -> ComparisonStats {
        let events = self.events_snapshot().await;
        self.stats.lock().await.comparison_stats(&self.bout_id, &events).0
    }

    /// Scores one round from the bout's accumulated event log and
    /// records the verdict in the audit chain.
    pub async fn score_round(&self, round: u32) -> Result<(RoundVerdict, ScoringDebug), ScoringError> {
        let round_events: Vec<CombatEvent> =
            self.events.lock().await.iter().filter(|e| e.header().round == round).cloned().collect();
        let (verdict, debug) = self.scoring.score_round(&self.bout_id, round, &round_events)?;
        let ts_ms = round_events.last().map(|e| e.ts_ms()).unwrap_or(0);
        self.audit.log_round_verdict(&self.bout_id, &verdict, ts_ms).await;
        info!(bout_id = %self.bout_id, round, winner = ?verdict.winner, "round verdict computed");
        self.round_verdicts.lock().await.insert(round, verdict.clone());
        Ok((verdict, debug))
    }

    /// Aggregates every round verdict scored so far into a fight-level
    /// decision (§6 "finalise_fight"): a round not yet scored via
    /// `score_round` simply isn't counted, the same way a judge's
    /// scorecard only totals rounds actually judged.
    pub async fn finalise_fight(&self) -> FightVerdict {
        let verdicts = self.round_verdicts.lock().await;
        let mut totals: std::collections::BTreeMap<FighterId, u32> =
            [(FighterId::Red, 0), (FighterId::Blue, 0)].into_iter().collect();
        for verdict in verdicts.values() {
            for (fighter, score) in &verdict.ten_point_must {
                *totals.entry(*fighter).or_insert(0) += *score as u32;
            }
        }
        let winner = match totals[&FighterId::Red].cmp(&totals[&FighterId::Blue]) {
            std::cmp::Ordering::Greater => Winner::Red,
            std::cmp::Ordering::Less => Winner::Blue,
            std::cmp::Ordering::Equal => Winner::Draw,
        };
        let verdict = FightVerdict { bout_id: self.bout_id.clone(), rounds_scored: verdicts.len() as u32, totals, winner };
        info!(bout_id = %self.bout_id, rounds_scored = verdict.rounds_scored, winner = ?verdict.winner, "fight verdict computed");
        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::Aspect;

    fn new_session() -> BoutSession {
        let (audit, _rx) = AuditLogger::new();
        BoutSession::new("bout-1", &Config::default(), audit)
    }

    fn takedown_input(round: u32, ts_ms: i64) -> JudgeEventInput {
        JudgeEventInput {
            bout_id: "bout-1".to_string(),
            round,
            fighter: FighterId::Red,
            aspect: Aspect::Grappling,
            event_type: "takedown-landed".to_string(),
            device_role: "judge-1".to_string(),
            ts_ms,
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn malformed_judge_event_is_rejected_and_never_lands() {
        let session = new_session();
        let mut input = takedown_input(1, 1_000);
        input.event_type = "spinning-backfist".to_string();
        let err = session.ingest_judge_event(input).await.unwrap_err();
        assert!(matches!(err, IngressError::UnknownEventType { .. }));
        assert!(session.events_snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn valid_judge_event_lands_and_scores() {
        let session = new_session();
        let accepted = session.ingest_judge_event(takedown_input(1, 1_000)).await.unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(session.events_snapshot().await.len(), 1);

        let (verdict, _debug) = session.score_round(1).await.unwrap();
        assert_eq!(verdict.winner, Winner::Red);
    }

    #[tokio::test]
    async fn live_stats_reflect_a_landed_takedown() {
        let session = new_session();
        session.ingest_judge_event(takedown_input(1, 1_000)).await.unwrap();
        let stats = session.live_stats().await;
        assert_eq!(stats.current_round_totals[&FighterId::Red].takedowns, 1);
    }

    #[tokio::test]
    async fn finalise_fight_sums_only_rounds_actually_scored() {
        let session = new_session();
        session.ingest_judge_event(takedown_input(1, 1_000)).await.unwrap();
        session.score_round(1).await.unwrap();
        session.ingest_judge_event(takedown_input(2, 1_000)).await.unwrap();
        // Round 2 is never scored via score_round.

        let fight = session.finalise_fight().await;
        assert_eq!(fight.rounds_scored, 1);
        assert_eq!(fight.winner, Winner::Red);
    }
}
