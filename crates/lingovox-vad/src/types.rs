use crate::energy;

/// One fixed-size window of frequency-domain magnitudes sampled from the
/// live microphone signal. Ephemeral: consumed immediately by the detector,
/// never buffered.
#[derive(Debug, Clone)]
pub struct SpectrumFrame {
    bins: Vec<f32>,
}

impl SpectrumFrame {
    pub fn new(bins: Vec<f32>) -> Self {
        Self { bins }
    }

    /// Frame with every bin at the same level. Handy for tests and probes.
    pub fn uniform(level: f32, bins: usize) -> Self {
        Self {
            bins: vec![level; bins],
        }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn mean_magnitude(&self) -> f32 {
        energy::mean_magnitude(&self.bins)
    }
}

/// Events emitted by the silence monitor. Timestamps are milliseconds since
/// the monitor started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// First frame above the threshold. Emitted once per recording.
    SpeechStart { timestamp_ms: u64 },
    /// Sustained silence after speech was confirmed. Emitted at most once
    /// per recording; the monitor ends afterwards.
    Endpoint {
        timestamp_ms: u64,
        silence_started_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_uniform_frame_is_the_level() {
        let frame = SpectrumFrame::uniform(20.0, 256);
        assert!((frame.mean_magnitude() - 20.0).abs() < f32::EPSILON);
    }
}
