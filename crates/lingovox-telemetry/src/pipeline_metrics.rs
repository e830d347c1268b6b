use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared metrics for cross-task pipeline monitoring
#[derive(Clone, Default)]
pub struct PipelineMetrics {
    // Voice activity
    pub frames_analyzed: Arc<AtomicU64>,
    pub speech_segments: Arc<AtomicU64>,
    pub endpoints_detected: Arc<AtomicU64>,
    pub last_energy_x10: Arc<AtomicU64>, // mean magnitude * 10

    // Recording
    pub chunks_captured: Arc<AtomicU64>,
    pub utterances_discarded: Arc<AtomicU64>,

    // Turn pipeline
    pub turns_completed: Arc<AtomicU64>,
    pub transcription_failures: Arc<AtomicU64>,
    pub generation_failures: Arc<AtomicU64>,
    pub synthesis_failures: Arc<AtomicU64>,
    pub last_turn_latency_ms: Arc<AtomicU64>,

    pub last_activity: Arc<RwLock<Option<Instant>>>,
}

impl PipelineMetrics {
    pub fn record_frame(&self, mean_energy: f32) {
        self.frames_analyzed.fetch_add(1, Ordering::Relaxed);
        self.last_energy_x10
            .store((mean_energy.max(0.0) * 10.0) as u64, Ordering::Relaxed);
        *self.last_activity.write() = Some(Instant::now());
    }

    pub fn record_speech_start(&self) {
        self.speech_segments.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_endpoint(&self) {
        self.endpoints_detected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self) {
        self.chunks_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded_utterance(&self) {
        self.utterances_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_turn_completed(&self, latency_ms: u64) {
        self.turns_completed.fetch_add(1, Ordering::Relaxed);
        self.last_turn_latency_ms
            .store(latency_ms, Ordering::Relaxed);
    }

    pub fn last_energy(&self) -> f32 {
        self.last_energy_x10.load(Ordering::Relaxed) as f32 / 10.0
    }
}
