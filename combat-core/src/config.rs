//! # config
//!
//! Single aggregate covering every tunable in the configuration surface
//! (dedup, fusion, smoother, harmoniser, scoring, worker health, stats
//! cache). Deserialisable from JSON or TOML; a complete `Default` impl
//! matches the documented defaults so a missing or unreadable config
//! file never prevents startup.
//!
//! Process-level operational knobs (`LOG_FILTER`, `CONFIG_PATH`,
//! `DATA_DIR`) are read straight from the environment the way
//! `uwb_hub::UwbHubConfig` reads its UDP port and OCS threshold: one
//! `std::env::var(...).ok().and_then(...).unwrap_or(default)` chain per
//! knob, never required.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub window_ms: i64,
    pub confidence_threshold: f32,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { window_ms: 100, confidence_threshold: 0.6 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub window_ms: i64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { window_ms: 150 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    pub window_frames: usize,
    pub consistency: f32,
    pub confidence_floor: f32,
    pub flow_threshold: f32,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self { window_frames: 5, consistency: 0.6, confidence_floor: 0.6, flow_threshold: 3.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmoniserConfig {
    pub proximity_window_ms: i64,
    pub judge_override_threshold: f32,
    pub cv_confidence_threshold: f32,
    pub buffer_size: usize,
    pub severity_mismatch_threshold: f32,
}

impl Default for HarmoniserConfig {
    fn default() -> Self {
        Self {
            proximity_window_ms: 200,
            judge_override_threshold: 0.8,
            cv_confidence_threshold: 0.9,
            buffer_size: 100,
            severity_mismatch_threshold: 0.3,
        }
    }
}

/// One (threshold, multiplier) step of a regularisation ladder (R1, R2, R5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegularisationStep {
    /// Inclusive upper bound on occurrence count for this step to apply.
    pub upto: u32,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegularisationConfig {
    /// R1: per-event-type technique diminishing returns.
    pub technique_ladder: Vec<RegularisationStep>,
    /// R2: significant-strike abuse guardrail.
    pub strike_abuse_ladder: Vec<RegularisationStep>,
    /// R3: control continuity threshold (seconds) and discount.
    pub control_continuity_threshold_sec: f64,
    pub control_continuity_multiplier: f64,
    pub control_gap_reset_sec: f64,
    /// R4: control-without-work guardrail.
    pub control_without_work_min_points: f64,
    pub control_without_work_max_strike_points: f64,
    pub control_without_work_max_ground_points: f64,
    pub control_without_work_multiplier: f64,
    /// R5: takedown-stuff cap.
    pub takedown_stuff_ladder: Vec<RegularisationStep>,
}

impl Default for RegularisationConfig {
    fn default() -> Self {
        Self {
            technique_ladder: vec![
                RegularisationStep { upto: 10, multiplier: 1.0 },
                RegularisationStep { upto: 20, multiplier: 0.75 },
                RegularisationStep { upto: u32::MAX, multiplier: 0.50 },
            ],
            strike_abuse_ladder: vec![
                RegularisationStep { upto: 8, multiplier: 1.0 },
                RegularisationStep { upto: 14, multiplier: 0.75 },
                RegularisationStep { upto: u32::MAX, multiplier: 0.50 },
            ],
            control_continuity_threshold_sec: 60.0,
            control_continuity_multiplier: 0.5,
            control_gap_reset_sec: 15.0,
            control_without_work_min_points: 20.0,
            control_without_work_max_strike_points: 10.0,
            control_without_work_max_ground_points: 10.0,
            control_without_work_multiplier: 0.75,
            takedown_stuff_ladder: vec![
                RegularisationStep { upto: 3, multiplier: 1.0 },
                RegularisationStep { upto: u32::MAX, multiplier: 0.5 },
            ],
        }
    }
}

/// One impact-lock tier, in descending priority order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImpactLockTier {
    pub delta_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactLockConfig {
    pub rocked: ImpactLockTier,
    pub kd_flash: ImpactLockTier,
    pub kd_hard: ImpactLockTier,
    pub kd_near_finish: ImpactLockTier,
    pub sub_near_finish: ImpactLockTier,
}

impl Default for ImpactLockConfig {
    fn default() -> Self {
        Self {
            rocked: ImpactLockTier { delta_threshold: 40.0 },
            kd_flash: ImpactLockTier { delta_threshold: 50.0 },
            kd_hard: ImpactLockTier { delta_threshold: 110.0 },
            kd_near_finish: ImpactLockTier { delta_threshold: 150.0 },
            sub_near_finish: ImpactLockTier { delta_threshold: 90.0 },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    pub draw_threshold: f64,
    pub min_delta_10_8: f64,
    pub min_delta_10_7: f64,
    pub protected_count_10_8: u32,
    pub protected_count_10_7: u32,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            draw_threshold: 10.0,
            min_delta_10_8: 100.0,
            min_delta_10_7: 200.0,
            protected_count_10_8: 2,
            protected_count_10_7: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub regularisation: RegularisationConfig,
    pub impact_locks: ImpactLockConfig,
    pub round: RoundConfig,
    pub control_bucket_sec: f64,
    pub control_points_per_bucket: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            regularisation: RegularisationConfig::default(),
            impact_locks: ImpactLockConfig::default(),
            round: RoundConfig::default(),
            control_bucket_sec: 10.0,
            control_points_per_bucket: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerHealthConfig {
    pub heartbeat_offline_sec: f64,
    pub heartbeat_degraded_sec: f64,
    pub latency_degraded_ms: f64,
    pub error_rate_unhealthy: f64,
}

impl Default for WorkerHealthConfig {
    fn default() -> Self {
        Self {
            heartbeat_offline_sec: 30.0,
            heartbeat_degraded_sec: 15.0,
            latency_degraded_ms: 200.0,
            error_rate_unhealthy: 0.10,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadWeights {
    pub latency: f64,
    pub queue: f64,
    pub queue_penalty_ms: f64,
}

impl Default for LoadWeights {
    fn default() -> Self {
        Self { latency: 0.6, queue: 0.4, queue_penalty_ms: 10.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub health: WorkerHealthConfig,
    pub load_weights: LoadWeights,
    pub health_check_interval_sec: u64,
    pub routing_history_cap: usize,
    pub worker_timeout_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            health: WorkerHealthConfig::default(),
            load_weights: LoadWeights::default(),
            health_check_interval_sec: 10,
            routing_history_cap: 1000,
            worker_timeout_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub cache_ttl_sec: f64,
    pub recent_window_sec: i64,
    pub cache_miss_warn_ms: u128,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { cache_ttl_sec: 1.0, recent_window_sec: 60, cache_miss_warn_ms: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub momentum_window_ms: i64,
    pub momentum_strike_count: u32,
    pub momentum_severity: f32,
    pub rocked_threshold: f32,
    pub rocked_severity: f32,
    pub rocked_confidence: f32,
    pub rocked_delay_ms: i64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            momentum_window_ms: 1500,
            momentum_strike_count: 4,
            momentum_severity: 0.7,
            rocked_threshold: 0.7,
            rocked_severity: 0.8,
            rocked_confidence: 0.85,
            rocked_delay_ms: 100,
        }
    }
}

/// Full configuration surface (§6). Constructed via `Default`, then
/// optionally overridden by a loaded JSON/TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dedup: DedupConfig,
    pub fusion: FusionConfig,
    pub smoother: SmootherConfig,
    pub harmoniser: HarmoniserConfig,
    pub scoring: ScoringConfig,
    pub worker: WorkerConfig,
    pub stats: StatsConfig,
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Load from the path named by `CONFIG_PATH`, falling back to
    /// built-in defaults if the variable is unset, the file is
    /// unreadable, or it fails to parse. Never fatal (§4.12).
    pub fn load() -> Self {
        let Some(path) = std::env::var("CONFIG_PATH").ok() else {
            info!("CONFIG_PATH not set, using built-in defaults");
            return Self::default();
        };

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("CONFIG_PATH={path} unreadable ({e}), using built-in defaults");
                return Self::default();
            }
        };

        let parsed = if path.ends_with(".toml") {
            toml::from_str(&raw).map_err(|e| e.to_string())
        } else {
            serde_json::from_str(&raw).map_err(|e| e.to_string())
        };

        match parsed {
            Ok(cfg) => {
                info!("loaded configuration from {path}");
                cfg
            }
            Err(e) => {
                warn!("CONFIG_PATH={path} failed to parse ({e}), using built-in defaults");
                Self::default()
            }
        }
    }

    /// Root directory for per-bout audit-mirror NDJSON files (`DATA_DIR`).
    pub fn data_dir() -> String {
        std::env::var("DATA_DIR").unwrap_or_else(|_| "./data".to_string())
    }

    /// Override for the `tracing_subscriber::EnvFilter` (`LOG_FILTER`).
    pub fn log_filter() -> Option<String> {
        std::env::var("LOG_FILTER").ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_json() {
        let cfg = Config::default();
        let json = serde_json::to_string(&cfg).expect("serialise");
        let back: Config = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(cfg.dedup.window_ms, back.dedup.window_ms);
        assert_eq!(cfg.scoring.round.draw_threshold, back.scoring.round.draw_threshold);
    }

    #[test]
    fn default_round_trips_through_toml() {
        let cfg = Config::default();
        let s = toml::to_string(&cfg).expect("serialise");
        let back: Config = toml::from_str(&s).expect("deserialise");
        assert_eq!(cfg.worker.health.heartbeat_offline_sec, back.worker.health.heartbeat_offline_sec);
    }

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.dedup.window_ms, 100);
        assert_eq!(cfg.dedup.confidence_threshold, 0.6);
        assert_eq!(cfg.fusion.window_ms, 150);
        assert_eq!(cfg.smoother.window_frames, 5);
        assert_eq!(cfg.harmoniser.proximity_window_ms, 200);
        assert_eq!(cfg.worker.health.heartbeat_offline_sec, 30.0);
        assert_eq!(cfg.worker.health.heartbeat_degraded_sec, 15.0);
        assert_eq!(cfg.stats.cache_ttl_sec, 1.0);
    }

    #[test]
    fn load_without_config_path_falls_back_to_default() {
        std::env::remove_var("CONFIG_PATH");
        let cfg = Config::load();
        assert_eq!(cfg.dedup.window_ms, 100);
    }
}
