//! # stats
//!
//! Stats Aggregator (§4.9): live-stats and red-vs-blue comparison
//! queries over an in-process event log, cached with a 1-second TTL.
//! Grounded on
//! `original_source/backend/stats_overlay/aggregator.py` (query shapes)
//! and `original_source/backend/stats_overlay/cache_manager.py`
//! (TTL cache idiom). The document-store-backed queries in the source
//! become plain functions over a caller-supplied event slice, since the
//! document store itself is an external collaborator (§1, §4.9).

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

use combat_types::{CombatEvent, EventKind, FighterId};

use crate::config::StatsConfig;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FighterTotals {
    pub significant_strikes: u32,
    pub total_strikes: u32,
    pub takedowns: u32,
    pub knockdowns: u32,
    pub control_time_sec: f64,
}

fn accumulate_totals(events: &[&CombatEvent]) -> BTreeMap<FighterId, FighterTotals> {
    let mut totals: BTreeMap<FighterId, FighterTotals> = BTreeMap::new();
    let mut open_control: HashMap<(FighterId, combat_types::ControlKind), i64> = HashMap::new();

    for event in events {
        let entry = totals.entry(event.fighter()).or_default();
        match event {
            CombatEvent::StrikeSignificant { .. } => {
                entry.significant_strikes += 1;
                entry.total_strikes += 1;
            }
            CombatEvent::StrikeHighImpact { .. } => {
                entry.total_strikes += 1;
            }
            CombatEvent::TakedownLanded { .. } => {
                entry.takedowns += 1;
            }
            CombatEvent::KnockdownFlash { .. } | CombatEvent::KnockdownHard { .. } | CombatEvent::KnockdownNearFinish { .. } => {
                entry.knockdowns += 1;
            }
            CombatEvent::ControlStart { kind, .. } => {
                open_control.insert((event.fighter(), *kind), event.ts_ms());
            }
            CombatEvent::ControlEnd { kind, .. } => {
                if let Some(start_ts) = open_control.remove(&(event.fighter(), *kind)) {
                    entry.control_time_sec += ((event.ts_ms() - start_ts).max(0) as f64) / 1000.0;
                }
            }
            _ => {}
        }
    }
    totals
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KdRockIndicators {
    pub has_kd: bool,
    pub has_rock: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveStats {
    pub bout_id: String,
    pub current_round: u32,
    pub current_round_totals: BTreeMap<FighterId, FighterTotals>,
    pub last_60s_totals: BTreeMap<FighterId, FighterTotals>,
    pub indicators: KdRockIndicators,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MetricDelta {
    pub red: f64,
    pub blue: f64,
    pub delta: f64,
    pub leader: Option<FighterId>,
}

fn delta_of(red: f64, blue: f64) -> MetricDelta {
    let leader = if red > blue {
        Some(FighterId::Red)
    } else if blue > red {
        Some(FighterId::Blue)
    } else {
        None
    };
    MetricDelta { red, blue, delta: red - blue, leader }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonStats {
    pub bout_id: String,
    pub significant_strikes: MetricDelta,
    pub total_strikes: MetricDelta,
    pub takedowns: MetricDelta,
    pub knockdowns: MetricDelta,
    pub control_time_sec: MetricDelta,
}

struct CacheEntry<T> {
    inserted_at: Instant,
    value: T,
}

/// Caches `LiveStats`/`ComparisonStats` per bout with a 1-second TTL,
/// invalidated manually whenever the caller records a new event for
/// that bout.
pub struct StatsAggregator {
    config: StatsConfig,
    live_cache: HashMap<String, CacheEntry<LiveStats>>,
    comparison_cache: HashMap<String, CacheEntry<ComparisonStats>>,
}

impl StatsAggregator {
    pub fn new(config: StatsConfig) -> Self {
        Self { config, live_cache: HashMap::new(), comparison_cache: HashMap::new() }
    }

    /// Drops any cached entries for `bout_id`. Call on every new event
    /// write for that bout (§4.9).
    pub fn invalidate(&mut self, bout_id: &str) {
        self.live_cache.remove(bout_id);
        self.comparison_cache.remove(bout_id);
    }

    fn fresh<T>(&self, entry: &CacheEntry<T>) -> bool {
        entry.inserted_at.elapsed() <= Duration::from_secs_f64(self.config.cache_ttl_sec)
    }

    fn warn_if_slow(&self, started: Instant, query: &str, bout_id: &str) {
        let elapsed_ms = started.elapsed().as_millis();
        if elapsed_ms > self.config.cache_miss_warn_ms {
            warn!(bout_id, query, elapsed_ms, "stats cache miss exceeded latency budget");
        }
    }

    /// Live stats for the bout: current round's totals, last-60s
    /// totals, and knockdown/rocked indicators within that window.
    pub fn live_stats(&mut self, bout_id: &str, events: &[CombatEvent]) -> (LiveStats, Duration) {
        let started = Instant::now();

        if let Some(cached) = self.live_cache.get(bout_id) {
            if self.fresh(cached) {
                return (cached.value.clone(), started.elapsed());
            }
        }

        let bout_events: Vec<&CombatEvent> = events.iter().filter(|e| e.header().bout_id == bout_id).collect();
        let current_round = bout_events.iter().max_by_key(|e| e.ts_ms()).map(|e| e.header().round).unwrap_or(1);
        let latest_ts = bout_events.iter().map(|e| e.ts_ms()).max().unwrap_or(0);

        let current_round_events: Vec<&CombatEvent> =
            bout_events.iter().filter(|e| e.header().round == current_round).copied().collect();
        let recent_events: Vec<&CombatEvent> = bout_events
            .iter()
            .filter(|e| latest_ts - e.ts_ms() <= self.config.recent_window_sec * 1000)
            .copied()
            .collect();

        let has_kd = recent_events.iter().any(|e| {
            matches!(
                e.kind(),
                EventKind::KnockdownFlash | EventKind::KnockdownHard | EventKind::KnockdownNearFinish
            )
        });
        let has_rock = recent_events.iter().any(|e| e.kind() == EventKind::Rocked);

        let stats = LiveStats {
            bout_id: bout_id.to_string(),
            current_round,
            current_round_totals: accumulate_totals(&current_round_events),
            last_60s_totals: accumulate_totals(&recent_events),
            indicators: KdRockIndicators { has_kd, has_rock },
        };

        self.warn_if_slow(started, "live_stats", bout_id);
        self.live_cache.insert(bout_id.to_string(), CacheEntry { inserted_at: Instant::now(), value: stats.clone() });
        (stats, started.elapsed())
    }

    /// Red-vs-blue comparison across the whole bout, with per-metric
    /// deltas and a leader tag.
    pub fn comparison_stats(&mut self, bout_id: &str, events: &[CombatEvent]) -> (ComparisonStats, Duration) {
        let started = Instant::now();

        if let Some(cached) = self.comparison_cache.get(bout_id) {
            if self.fresh(cached) {
                return (cached.value.clone(), started.elapsed());
            }
        }

        let bout_events: Vec<&CombatEvent> = events.iter().filter(|e| e.header().bout_id == bout_id).collect();
        let totals = accumulate_totals(&bout_events);
        let red = totals.get(&FighterId::Red).copied().unwrap_or_default();
        let blue = totals.get(&FighterId::Blue).copied().unwrap_or_default();

        let stats = ComparisonStats {
            bout_id: bout_id.to_string(),
            significant_strikes: delta_of(red.significant_strikes as f64, blue.significant_strikes as f64),
            total_strikes: delta_of(red.total_strikes as f64, blue.total_strikes as f64),
            takedowns: delta_of(red.takedowns as f64, blue.takedowns as f64),
            knockdowns: delta_of(red.knockdowns as f64, blue.knockdowns as f64),
            control_time_sec: delta_of(red.control_time_sec, blue.control_time_sec),
        };

        self.warn_if_slow(started, "comparison_stats", bout_id);
        self.comparison_cache
            .insert(bout_id.to_string(), CacheEntry { inserted_at: Instant::now(), value: stats.clone() });
        (stats, started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_types::{EventHeader, EventSource, Technique};

    fn strike(bout: &str, fighter: FighterId, ts_ms: i64, significant: bool) -> CombatEvent {
        let header = EventHeader::new(format!("e-{ts_ms}"), bout, 1, fighter, ts_ms, 0.9, EventSource::CvSystem);
        if significant {
            CombatEvent::StrikeSignificant { header, technique: Technique::Cross, severity: 0.6 }
        } else {
            CombatEvent::StrikeHighImpact { header, technique: Technique::Cross, severity: 0.6 }
        }
    }

    fn kd(bout: &str, fighter: FighterId, ts_ms: i64) -> CombatEvent {
        let header = EventHeader::new(format!("kd-{ts_ms}"), bout, 1, fighter, ts_ms, 0.9, EventSource::CvSystem);
        CombatEvent::KnockdownFlash { header, severity: 0.9 }
    }

    #[test]
    fn live_stats_with_no_events_defaults_to_round_one() {
        let mut agg = StatsAggregator::new(StatsConfig::default());
        let (stats, _) = agg.live_stats("bout-1", &[]);
        assert_eq!(stats.current_round, 1);
        assert!(!stats.indicators.has_kd);
    }

    #[test]
    fn live_stats_detects_knockdown_in_recent_window() {
        let mut agg = StatsAggregator::new(StatsConfig::default());
        let events = vec![kd("bout-1", FighterId::Red, 5_000)];
        let (stats, _) = agg.live_stats("bout-1", &events);
        assert!(stats.indicators.has_kd);
        assert!(!stats.indicators.has_rock);
    }

    #[test]
    fn cache_hit_returns_same_snapshot_until_invalidated() {
        let mut agg = StatsAggregator::new(StatsConfig::default());
        let events = vec![strike("bout-1", FighterId::Red, 0, true)];
        let (first, _) = agg.live_stats("bout-1", &events);
        let (second, _) = agg.live_stats("bout-1", &[]);
        assert_eq!(first.current_round_totals, second.current_round_totals);

        agg.invalidate("bout-1");
        let (third, _) = agg.live_stats("bout-1", &[]);
        assert!(third.current_round_totals.is_empty());
    }

    #[test]
    fn comparison_stats_picks_leader_by_max() {
        let mut agg = StatsAggregator::new(StatsConfig::default());
        let events = vec![
            strike("bout-1", FighterId::Red, 0, true),
            strike("bout-1", FighterId::Red, 100, true),
            strike("bout-1", FighterId::Blue, 200, true),
        ];
        let (stats, _) = agg.comparison_stats("bout-1", &events);
        assert_eq!(stats.significant_strikes.leader, Some(FighterId::Red));
        assert_eq!(stats.significant_strikes.delta, 1.0);
    }

    #[test]
    fn equal_metrics_have_no_leader() {
        let mut agg = StatsAggregator::new(StatsConfig::default());
        let events =
            vec![strike("bout-1", FighterId::Red, 0, true), strike("bout-1", FighterId::Blue, 100, true)];
        let (stats, _) = agg.comparison_stats("bout-1", &events);
        assert_eq!(stats.significant_strikes.leader, None);
    }
}
