use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Default, Serialize, Clone)]
pub struct MetricsSnapshot {
    pub stages: BTreeMap<String, StageMetrics>,
    pub frames_presented: u64,
    pub fetch_failures: u64,
    pub stream_restarts: u64,
    pub playback_duration_ms: f64,
}

#[derive(Debug, Default, Serialize, Clone)]
pub struct StageMetrics {
    pub calls: u64,
    pub total_duration_ms: f64,
    pub max_duration_ms: f64,
}

impl StageMetrics {
    pub fn mean_duration_ms(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.total_duration_ms / self.calls as f64
        }
    }
}

/// Cheap to clone; all clones share one snapshot.
#[derive(Debug, Default, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_stage(&self, stage_name: &str) -> StageTimer {
        StageTimer {
            stage: stage_name.to_string(),
            started_at: Instant::now(),
            collector: self.inner.clone(),
            recorded: false,
        }
    }

    pub fn record_presented(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.frames_presented += 1;
        }
    }

    pub fn record_fetch_failure(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.fetch_failures += 1;
        }
    }

    pub fn record_stream_restart(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.stream_restarts += 1;
        }
    }

    pub fn record_playback_duration(&self, duration: Duration) {
        if let Ok(mut guard) = self.inner.lock() {
            guard.playback_duration_ms += duration.as_secs_f64() * 1_000.0;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn reset(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = MetricsSnapshot::default();
        }
    }
}

/// Records the elapsed time for one stage when dropped.
pub struct StageTimer {
    stage: String,
    started_at: Instant,
    collector: Arc<Mutex<MetricsSnapshot>>,
    recorded: bool,
}

impl StageTimer {
    fn record(&mut self) {
        if self.recorded {
            return;
        }
        let duration = self.started_at.elapsed();
        if let Ok(mut guard) = self.collector.lock() {
            let metrics = guard.stages.entry(self.stage.clone()).or_default();
            metrics.calls += 1;
            let duration_ms = duration.as_secs_f64() * 1_000.0;
            metrics.total_duration_ms += duration_ms;
            if duration_ms > metrics.max_duration_ms {
                metrics.max_duration_ms = duration_ms;
            }
        }
        self.recorded = true;
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        self.record();
    }
}

pub fn log_snapshot(snapshot: &MetricsSnapshot) {
    info!(
        frames_presented = snapshot.frames_presented,
        fetch_failures = snapshot.fetch_failures,
        stream_restarts = snapshot.stream_restarts,
        playback_ms = snapshot.playback_duration_ms,
        "Playback metrics summary"
    );
    for (stage, metrics) in &snapshot.stages {
        info!(
            stage = stage.as_str(),
            calls = metrics.calls,
            mean_ms = metrics.mean_duration_ms(),
            max_ms = metrics.max_duration_ms,
            "Stage metrics"
        );
    }
    debug!(stage_count = snapshot.stages.len(), "Metrics logged");
}
