use tokio::time::Instant;

use crate::config::SilenceConfig;

/// Classification of one observed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameVerdict {
    /// Energy above threshold. `first` is set on the very first speech frame
    /// of the recording; any running silence window has been cancelled.
    Speech { first: bool },
    /// Below threshold, but no speech has been heard yet. Ambient noise-floor
    /// silence at turn start never arms the endpoint timer.
    LeadingSilence,
    /// Below threshold after speech; the silence window is running since
    /// `started`.
    TrailingSilence { started: Instant },
}

/// Pure endpoint-detection core: two flags and a nullable silence start.
/// The surrounding monitor supplies frames at a fixed interval and owns the
/// actual timer; this type only decides when a deadline exists.
pub struct EndpointDetector {
    config: SilenceConfig,
    has_spoken: bool,
    silence_started_at: Option<Instant>,
}

impl EndpointDetector {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            has_spoken: false,
            silence_started_at: None,
        }
    }

    /// Feed the mean magnitude of one frame observed at `now`.
    pub fn observe(&mut self, mean_energy: f32, now: Instant) -> FrameVerdict {
        if mean_energy > self.config.threshold_energy {
            let first = !self.has_spoken;
            self.has_spoken = true;
            self.silence_started_at = None;
            FrameVerdict::Speech { first }
        } else if !self.has_spoken {
            FrameVerdict::LeadingSilence
        } else {
            let started = *self.silence_started_at.get_or_insert(now);
            FrameVerdict::TrailingSilence { started }
        }
    }

    /// Instant at which the endpoint fires unless speech resumes first.
    pub fn silence_deadline(&self) -> Option<Instant> {
        self.silence_started_at
            .map(|started| started + self.config.silence_duration())
    }

    pub fn has_spoken(&self) -> bool {
        self.has_spoken
    }

    pub fn silence_started_at(&self) -> Option<Instant> {
        self.silence_started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> SilenceConfig {
        SilenceConfig {
            threshold_energy: 15.0,
            silence_duration_ms: 1_800,
            frame_interval_ms: 250,
        }
    }

    #[test]
    fn leading_silence_never_arms_the_timer() {
        let mut detector = EndpointDetector::new(config());
        let now = Instant::now();
        for i in 0..50 {
            let verdict = detector.observe(5.0, now + Duration::from_millis(i * 250));
            assert_eq!(verdict, FrameVerdict::LeadingSilence);
            assert_eq!(detector.silence_deadline(), None);
        }
        assert!(!detector.has_spoken());
    }

    #[test]
    fn silence_after_speech_arms_a_deadline() {
        let mut detector = EndpointDetector::new(config());
        let t0 = Instant::now();

        assert_eq!(
            detector.observe(20.0, t0),
            FrameVerdict::Speech { first: true }
        );

        let silence_at = t0 + Duration::from_millis(250);
        assert_eq!(
            detector.observe(6.0, silence_at),
            FrameVerdict::TrailingSilence { started: silence_at }
        );
        assert_eq!(
            detector.silence_deadline(),
            Some(silence_at + Duration::from_millis(1_800))
        );
    }

    #[test]
    fn continued_silence_keeps_the_original_start() {
        let mut detector = EndpointDetector::new(config());
        let t0 = Instant::now();
        detector.observe(20.0, t0);

        let silence_at = t0 + Duration::from_millis(250);
        detector.observe(5.0, silence_at);
        detector.observe(5.0, t0 + Duration::from_millis(500));
        detector.observe(5.0, t0 + Duration::from_millis(750));

        assert_eq!(
            detector.silence_deadline(),
            Some(silence_at + Duration::from_millis(1_800))
        );
    }

    #[test]
    fn speech_cancels_a_running_silence_window() {
        let mut detector = EndpointDetector::new(config());
        let t0 = Instant::now();
        detector.observe(20.0, t0);
        detector.observe(5.0, t0 + Duration::from_millis(250));
        assert!(detector.silence_deadline().is_some());

        assert_eq!(
            detector.observe(18.0, t0 + Duration::from_millis(500)),
            FrameVerdict::Speech { first: false }
        );
        assert_eq!(detector.silence_deadline(), None);

        // a fresh qualifying silence run arms its own independent window
        let second_silence = t0 + Duration::from_millis(750);
        detector.observe(4.0, second_silence);
        assert_eq!(
            detector.silence_deadline(),
            Some(second_silence + Duration::from_millis(1_800))
        );
    }
}
