//! # worker_manager
//!
//! Worker Manager (§4.2). Health-tracks a pool of CV workers and picks
//! the best one for each frame. Grounded on
//! `original_source/backend/cv_router/worker_manager.py` for the EMA
//! latency smoothing, health-transition thresholds, and load-score
//! formula. Uses `tokio::sync::RwLock` over the worker table — many
//! concurrent readers, one writer per metrics update — the same
//! primitive the teacher uses throughout for shared mutable state; no
//! lock-free crate is warranted at this scale (§4.2).

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::WorkerConfig;
use crate::error::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Offline,
}

#[derive(Debug, Clone)]
pub struct Worker {
    pub worker_id: String,
    pub endpoint: String,
    pub status: WorkerStatus,
    pub avg_latency_ms: f64,
    pub queue_depth: u32,
    pub frames_processed: u64,
    pub errors: u64,
    pub last_heartbeat: Instant,
}

impl Worker {
    fn new(worker_id: String, endpoint: String) -> Self {
        Self {
            worker_id,
            endpoint,
            status: WorkerStatus::Healthy,
            avg_latency_ms: 0.0,
            queue_depth: 0,
            frames_processed: 0,
            errors: 0,
            last_heartbeat: Instant::now(),
        }
    }

    fn error_rate(&self) -> f64 {
        self.errors as f64 / self.frames_processed.max(1) as f64
    }
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub frame_id: String,
    pub worker_id: String,
    pub load_score: f64,
    pub worker_latency_ms: f64,
    pub worker_queue_depth: u32,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerPoolMetrics {
    pub total_workers: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub unhealthy: usize,
    pub offline: usize,
    pub avg_latency_ms: f64,
    pub total_frames_processed: u64,
    pub total_errors: u64,
}

pub struct WorkerManager {
    config: WorkerConfig,
    workers: RwLock<HashMap<String, Worker>>,
    routing_history: RwLock<VecDeque<RoutingDecision>>,
    next_id: std::sync::atomic::AtomicU64,
}

impl WorkerManager {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            workers: RwLock::new(HashMap::new()),
            routing_history: RwLock::new(VecDeque::new()),
            next_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub async fn register_worker(&self, endpoint: impl Into<String>) -> String {
        let n = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let worker_id = format!("worker-{n}");
        let endpoint = endpoint.into();
        info!("worker registered: {worker_id} at {endpoint}");
        self.workers.write().await.insert(worker_id.clone(), Worker::new(worker_id.clone(), endpoint));
        worker_id
    }

    pub async fn deregister_worker(&self, worker_id: &str) -> Result<(), WorkerError> {
        let mut workers = self.workers.write().await;
        match workers.remove(worker_id) {
            Some(_) => {
                info!("worker deregistered: {worker_id}");
                Ok(())
            }
            None => Err(WorkerError::UnknownWorker { worker_id: worker_id.to_string() }),
        }
    }

    pub async fn update_worker_metrics(
        &self,
        worker_id: &str,
        latency_ms: f64,
        queue_depth: u32,
    ) -> Result<(), WorkerError> {
        let mut workers = self.workers.write().await;
        let worker = workers.get_mut(worker_id).ok_or_else(|| WorkerError::UnknownWorker {
            worker_id: worker_id.to_string(),
        })?;

        const ALPHA: f64 = 0.3;
        worker.avg_latency_ms = ALPHA * latency_ms + (1.0 - ALPHA) * worker.avg_latency_ms;
        worker.queue_depth = queue_depth;
        worker.frames_processed += 1;
        worker.last_heartbeat = Instant::now();
        Ok(())
    }

    pub async fn report_worker_error(&self, worker_id: &str) -> Result<(), WorkerError> {
        let mut workers = self.workers.write().await;
        let worker = workers.get_mut(worker_id).ok_or_else(|| WorkerError::UnknownWorker {
            worker_id: worker_id.to_string(),
        })?;
        worker.errors += 1;
        if worker.error_rate() > self.config.health.error_rate_unhealthy {
            worker.status = WorkerStatus::Unhealthy;
            warn!(
                "worker {worker_id} marked unhealthy (error rate {:.2}%)",
                worker.error_rate() * 100.0
            );
        }
        Ok(())
    }

    fn load_score(&self, worker: &Worker) -> f64 {
        let w = &self.config.load_weights;
        worker.avg_latency_ms * w.latency + worker.queue_depth as f64 * w.queue_penalty_ms * w.queue
    }

    /// Selects the best worker for a frame: lowest load-score among
    /// healthy workers, falling back to degraded if none are healthy.
    /// Returns `None` (no error) if no worker can take the frame.
    pub async fn select_worker(&self, frame_id: &str) -> Option<String> {
        let workers = self.workers.read().await;

        let mut candidates: Vec<&Worker> =
            workers.values().filter(|w| w.status == WorkerStatus::Healthy).collect();
        if candidates.is_empty() {
            candidates = workers.values().filter(|w| w.status == WorkerStatus::Degraded).collect();
        }
        if candidates.is_empty() {
            warn!("no healthy or degraded workers available for frame {frame_id}");
            return None;
        }

        let selected = candidates
            .into_iter()
            .min_by(|a, b| self.load_score(a).partial_cmp(&self.load_score(b)).unwrap())?;

        let decision = RoutingDecision {
            frame_id: frame_id.to_string(),
            worker_id: selected.worker_id.clone(),
            load_score: self.load_score(selected),
            worker_latency_ms: selected.avg_latency_ms,
            worker_queue_depth: selected.queue_depth,
        };
        let selected_id = selected.worker_id.clone();
        drop(workers);

        let mut history = self.routing_history.write().await;
        history.push_back(decision);
        while history.len() > self.config.routing_history_cap {
            history.pop_front();
        }

        Some(selected_id)
    }

    /// One pass of the periodic health check (§4.2, §5: run at a
    /// 10-second interval by the composition root).
    pub async fn run_health_check(&self) {
        let mut workers = self.workers.write().await;
        let now = Instant::now();
        for worker in workers.values_mut() {
            let age = now.duration_since(worker.last_heartbeat).as_secs_f64();

            if age > self.config.health.heartbeat_offline_sec {
                if worker.status != WorkerStatus::Offline {
                    warn!("worker {} marked offline (no heartbeat for {age:.0}s)", worker.worker_id);
                }
                worker.status = WorkerStatus::Offline;
            } else if age > self.config.health.heartbeat_degraded_sec {
                worker.status = WorkerStatus::Degraded;
            } else if worker.avg_latency_ms > self.config.health.latency_degraded_ms {
                if worker.status != WorkerStatus::Degraded {
                    warn!(
                        "worker {} marked degraded (latency {:.0}ms)",
                        worker.worker_id, worker.avg_latency_ms
                    );
                }
                worker.status = WorkerStatus::Degraded;
            } else if worker.status != WorkerStatus::Healthy {
                worker.status = WorkerStatus::Healthy;
                info!("worker {} recovered to healthy", worker.worker_id);
            }
        }
    }

    pub async fn metrics(&self) -> WorkerPoolMetrics {
        let workers = self.workers.read().await;
        let mut m = WorkerPoolMetrics { total_workers: workers.len(), ..Default::default() };
        let mut latency_sum = 0.0;
        for w in workers.values() {
            match w.status {
                WorkerStatus::Healthy => m.healthy += 1,
                WorkerStatus::Degraded => m.degraded += 1,
                WorkerStatus::Unhealthy => m.unhealthy += 1,
                WorkerStatus::Offline => m.offline += 1,
            }
            latency_sum += w.avg_latency_ms;
            m.total_frames_processed += w.frames_processed;
            m.total_errors += w.errors;
        }
        m.avg_latency_ms = if workers.is_empty() { 0.0 } else { latency_sum / workers.len() as f64 };
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> WorkerManager {
        WorkerManager::new(WorkerConfig::default())
    }

    #[tokio::test]
    async fn select_worker_returns_none_with_empty_pool() {
        let mgr = manager();
        assert!(mgr.select_worker("frame-1").await.is_none());
    }

    #[tokio::test]
    async fn select_worker_prefers_lower_load_score() {
        let mgr = manager();
        let a = mgr.register_worker("a").await;
        let b = mgr.register_worker("b").await;
        mgr.update_worker_metrics(&a, 300.0, 5).await.unwrap();
        mgr.update_worker_metrics(&b, 10.0, 0).await.unwrap();

        let chosen = mgr.select_worker("frame-1").await.unwrap();
        assert_eq!(chosen, b);
    }

    #[tokio::test]
    async fn error_rate_over_threshold_marks_unhealthy() {
        let mgr = manager();
        let id = mgr.register_worker("a").await;
        mgr.update_worker_metrics(&id, 10.0, 0).await.unwrap();
        for _ in 0..9 {
            mgr.update_worker_metrics(&id, 10.0, 0).await.unwrap();
        }
        mgr.report_worker_error(&id).await.unwrap();
        mgr.report_worker_error(&id).await.unwrap();
        let workers = mgr.workers.read().await;
        assert_eq!(workers.get(&id).unwrap().status, WorkerStatus::Unhealthy);
    }

    #[tokio::test]
    async fn health_check_marks_stale_worker_degraded_then_offline() {
        let mut cfg = WorkerConfig::default();
        cfg.health.heartbeat_degraded_sec = 0.0;
        cfg.health.heartbeat_offline_sec = 0.01;
        let mgr = WorkerManager::new(cfg);
        let id = mgr.register_worker("a").await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        mgr.run_health_check().await;
        let workers = mgr.workers.read().await;
        assert_eq!(workers.get(&id).unwrap().status, WorkerStatus::Offline);
    }

    #[tokio::test]
    async fn routing_history_is_capped() {
        let mut cfg = WorkerConfig::default();
        cfg.routing_history_cap = 3;
        let mgr = WorkerManager::new(cfg);
        let id = mgr.register_worker("a").await;
        for i in 0..10 {
            mgr.update_worker_metrics(&id, 5.0, 0).await.unwrap();
            mgr.select_worker(&format!("frame-{i}")).await;
        }
        let history = mgr.routing_history.read().await;
        assert_eq!(history.len(), 3);
    }
}
