mod audit;
mod classifier;
mod config;
mod error;
mod fuser;
mod harmonizer;
mod ingestor;
mod ingress;
mod normalise;
mod pipeline;
mod scoring;
mod session;
mod smoother;
mod stats;
mod worker_manager;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::info;

use audit::{run_mirror_writer, AuditLogger};
use config::Config;
use ingestor::{StreamIngestor, TransportKind};
use session::BoutSession;
use worker_manager::WorkerManager;

static STARTUP_MS: AtomicU64 = AtomicU64::new(0);

/// Routes each emitted `Frame` to a CV worker. Actual inference is an
/// external collaborator (§1) — this loop only records which worker a
/// frame was assigned to; the worker's response re-enters the system as
/// a `RawCvInput` through `BoutSession::ingest_raw_cv_input`, fed by
/// whatever external harness is driving this bout (for demos, that
/// harness replays the `combat-sim` scenario generator's NDJSON
/// output through the same ingress contracts a real deployment uses).
async fn run_routing_loop(worker_manager: Arc<WorkerManager>, mut frames: tokio::sync::mpsc::Receiver<combat_types::Frame>) {
    while let Some(frame) = frames.recv().await {
        let frame_id = format!("{}-{}-{}", frame.bout_id, frame.camera_id, frame.ts_ms);
        match worker_manager.select_worker(&frame_id).await {
            Some(worker_id) => tracing::debug!(frame_id, worker_id, "frame routed"),
            None => tracing::warn!(frame_id, "no worker available, frame dropped"),
        }
    }
}

async fn run_worker_health_check_loop(worker_manager: Arc<WorkerManager>, interval_sec: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_sec));
    loop {
        interval.tick().await;
        worker_manager.run_health_check().await;
    }
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[tokio::main]
async fn main() {
    let startup_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
    STARTUP_MS.store(startup_ms, Ordering::Relaxed);

    tracing_subscriber::fmt()
        .with_env_filter(
            config::Config::log_filter()
                .and_then(|f| tracing_subscriber::EnvFilter::try_new(f).ok())
                .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("combat_core=info")),
        )
        .init();

    info!("combat-core v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    let data_dir = Config::data_dir();

    // Audit Log: hash-chaining happens synchronously in `AuditLogger`,
    // NDJSON mirroring is a separately-spawned task (§4.10, §4.14).
    let (audit_logger, mirror_rx) = AuditLogger::new();
    tokio::spawn(run_mirror_writer(data_dir, mirror_rx));

    // Worker Manager + periodic health check (§4.2, §5: every 10s).
    let worker_manager = Arc::new(WorkerManager::new(config.worker.clone()));
    for endpoint in env_list("WORKER_ENDPOINTS", "mock://cv-worker-1,mock://cv-worker-2") {
        let worker_id = worker_manager.register_worker(endpoint.clone()).await;
        info!(worker_id, endpoint, "worker registered");
    }
    tokio::spawn(run_worker_health_check_loop(
        worker_manager.clone(),
        config.worker.health_check_interval_sec,
    ));

    // Stream Ingestor: one mock camera feed per entry in CAMERA_IDS,
    // forwarding Frames into the routing loop (§4.1, §4.2, §4.14).
    let bout_id = std::env::var("BOUT_ID").unwrap_or_else(|_| "demo-bout".to_string());
    let ingestor = Arc::new(StreamIngestor::new(bout_id.clone()));
    let (frame_tx, frame_rx) = tokio::sync::mpsc::channel(256);
    ingestor.set_callback(frame_tx).await;
    for camera_id in env_list("CAMERA_IDS", "cam-1,cam-2") {
        if let Err(e) = ingestor.add_stream(camera_id.clone(), TransportKind::Mock, format!("mock://{camera_id}")).await {
            tracing::warn!(camera_id, error = %e, "failed to add camera stream");
        }
    }
    tokio::spawn(run_routing_loop(worker_manager.clone(), frame_rx));

    // BoutSession: smoothing → fusion → classification → dedup/gate →
    // harmonisation → normalisation/scoring/audit for one bout's worth
    // of typed events (§4.3-§4.11, §4.14). Held by whatever drives
    // ingestion of post-inference `RawCvInput`/judge events into it.
    let _session = Arc::new(BoutSession::new(bout_id.clone(), &config, audit_logger.clone()));

    info!(bout_id, "bout session ready");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => tracing::error!("failed to listen for shutdown signal: {e}"),
    }
}
