//! # ingestor
//!
//! Stream Ingestor (§4.1). Opens camera feeds and emits a `Frame`
//! roughly every 1/FPS seconds per feed. Grounded on
//! `original_source/backend/cv_router/stream_ingestor.py` for the
//! per-feed FPS EMA and 30fps cadence, and on `uwb_hub`'s never-crash
//! task-per-feed idiom: one feed's transport failure marks it inactive
//! and logs, it never stops or panics the others.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use combat_types::Frame;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::error::IngestorError;

const TARGET_FPS: f64 = 30.0;

/// Camera transport kind. This implementation, like the source it is
/// grounded on, ingests every kind through the same mock frame-emission
/// loop — real RTMP/SRT/WebSocket decoding is external collaborator
/// territory (§1); the kind is recorded for operational visibility only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Mock,
    Rtmp,
    Srt,
    WebSocket,
}

#[derive(Debug, Clone)]
pub struct StreamStats {
    pub active: bool,
    pub fps: f64,
    pub dropped_frames: u64,
    pub total_frames: u64,
    pub last_frame_ts_ms: Option<i64>,
}

impl Default for StreamStats {
    fn default() -> Self {
        Self { active: true, fps: 0.0, dropped_frames: 0, total_frames: 0, last_frame_ts_ms: None }
    }
}

struct StreamHandle {
    stats: Arc<RwLock<StreamStats>>,
    task: tokio::task::JoinHandle<()>,
}

type Sink = Arc<RwLock<Option<mpsc::Sender<Frame>>>>;

/// Ingests frames from N camera feeds and forwards them to a single
/// downstream sink registered via `set_callback`.
pub struct StreamIngestor {
    bout_id: String,
    streams: RwLock<HashMap<String, StreamHandle>>,
    sink: Sink,
}

impl StreamIngestor {
    pub fn new(bout_id: impl Into<String>) -> Self {
        Self { bout_id: bout_id.into(), streams: RwLock::new(HashMap::new()), sink: Arc::new(RwLock::new(None)) }
    }

    /// Registers the downstream sink called once per emitted frame.
    pub async fn set_callback(&self, sink: mpsc::Sender<Frame>) {
        *self.sink.write().await = Some(sink);
    }

    /// Opens a new camera feed and starts its fixed-cadence emission
    /// task. Never raises to the caller beyond the initial acceptance
    /// (§4.1) — subsequent transport errors only mark the feed inactive.
    pub async fn add_stream(
        &self,
        camera_id: impl Into<String>,
        kind: TransportKind,
        url: impl Into<String>,
    ) -> Result<(), IngestorError> {
        let camera_id = camera_id.into();
        let url = url.into();
        let mut streams = self.streams.write().await;
        if streams.contains_key(&camera_id) {
            return Err(IngestorError::DuplicateCamera { camera_id });
        }

        let stats = Arc::new(RwLock::new(StreamStats::default()));
        let task = tokio::spawn(ingest_loop(
            self.bout_id.clone(),
            camera_id.clone(),
            kind,
            stats.clone(),
            self.sink.clone(),
        ));

        info!("stream added: {camera_id} ({kind:?}) at {url}");
        streams.insert(camera_id, StreamHandle { stats, task });
        Ok(())
    }

    /// Stops emission for a feed and releases its task.
    pub async fn remove_stream(&self, camera_id: &str) -> Result<(), IngestorError> {
        let mut streams = self.streams.write().await;
        match streams.remove(camera_id) {
            Some(handle) => {
                handle.task.abort();
                info!("stream removed: {camera_id}");
                Ok(())
            }
            None => Err(IngestorError::UnknownCamera { camera_id: camera_id.to_string() }),
        }
    }

    pub async fn stream_stats(&self, camera_id: &str) -> Option<StreamStats> {
        let streams = self.streams.read().await;
        match streams.get(camera_id) {
            Some(handle) => Some(handle.stats.read().await.clone()),
            None => None,
        }
    }
}

async fn ingest_loop(
    bout_id: String,
    camera_id: String,
    kind: TransportKind,
    stats: Arc<RwLock<StreamStats>>,
    sink: Sink,
) {
    let mut sequence_num: u64 = 0;
    loop {
        {
            let s = stats.read().await;
            if !s.active {
                return;
            }
        }

        let now_ms = now_ms();
        {
            let mut s = stats.write().await;
            if let Some(last) = s.last_frame_ts_ms {
                let delta_sec = (now_ms - last) as f64 / 1000.0;
                if delta_sec > 0.0 {
                    s.fps = 0.9 * s.fps + 0.1 * (1.0 / delta_sec);
                }
            }
            s.last_frame_ts_ms = Some(now_ms);
            s.total_frames += 1;
        }

        let frame = Frame {
            bout_id: bout_id.clone(),
            camera_id: camera_id.clone(),
            ts_ms: now_ms,
            payload: mock_payload(kind, sequence_num),
        };
        sequence_num += 1;

        let sink_guard = sink.read().await;
        if let Some(tx) = sink_guard.as_ref() {
            if tx.send(frame).await.is_err() {
                let mut s = stats.write().await;
                s.dropped_frames += 1;
            }
        } else {
            let mut s = stats.write().await;
            s.dropped_frames += 1;
        }
        drop(sink_guard);

        tokio::time::sleep(Duration::from_secs_f64(1.0 / TARGET_FPS)).await;
    }
}

fn mock_payload(kind: TransportKind, sequence_num: u64) -> Vec<u8> {
    format!("mock_frame_{kind:?}_{sequence_num}").into_bytes()
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_stream_rejects_duplicate_camera_id() {
        let ingestor = StreamIngestor::new("bout-1");
        ingestor.add_stream("cam-a", TransportKind::Mock, "mock://cam-a").await.unwrap();
        let err = ingestor.add_stream("cam-a", TransportKind::Mock, "mock://cam-a").await;
        assert!(matches!(err, Err(IngestorError::DuplicateCamera { .. })));
        ingestor.remove_stream("cam-a").await.unwrap();
    }

    #[tokio::test]
    async fn remove_unknown_stream_errors() {
        let ingestor = StreamIngestor::new("bout-1");
        let err = ingestor.remove_stream("missing").await;
        assert!(matches!(err, Err(IngestorError::UnknownCamera { .. })));
    }

    #[tokio::test]
    async fn frames_are_dropped_until_callback_is_registered() {
        let ingestor = StreamIngestor::new("bout-1");
        ingestor.add_stream("cam-a", TransportKind::Mock, "mock://cam-a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let stats = ingestor.stream_stats("cam-a").await.unwrap();
        assert!(stats.total_frames > 0);
        assert_eq!(stats.dropped_frames, stats.total_frames);
        ingestor.remove_stream("cam-a").await.unwrap();
    }

    #[test]
    fn default_stream_stats_starts_active_with_zero_counters() {
        let stats = StreamStats::default();
        assert!(stats.active);
        assert_eq!(stats.total_frames, 0);
        assert_eq!(stats.dropped_frames, 0);
        assert_eq!(stats.fps, 0.0);
    }
}
