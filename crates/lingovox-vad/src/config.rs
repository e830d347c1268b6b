use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{
    DEFAULT_FRAME_INTERVAL_MS, DEFAULT_SILENCE_DURATION_MS, DEFAULT_THRESHOLD_ENERGY,
};

/// Tuning for the endpoint detector. Immutable for the lifetime of one
/// listening session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SilenceConfig {
    /// Mean magnitude above which a frame counts as speech.
    pub threshold_energy: f32,
    /// Silence must persist this long after speech before the endpoint fires.
    pub silence_duration_ms: u64,
    /// Fixed interval between analysis frames.
    pub frame_interval_ms: u64,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold_energy: DEFAULT_THRESHOLD_ENERGY,
            silence_duration_ms: DEFAULT_SILENCE_DURATION_MS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
        }
    }
}

impl SilenceConfig {
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_constants() {
        let config = SilenceConfig::default();
        assert_eq!(config.threshold_energy, 15.0);
        assert_eq!(config.silence_duration(), Duration::from_millis(1_800));
        assert_eq!(config.frame_interval(), Duration::from_millis(250));
    }
}
