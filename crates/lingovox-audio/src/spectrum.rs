use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use lingovox_vad::{SpectrumFrame, SpectrumSource, SPECTRUM_BINS};

/// FFT window size; yields `SPECTRUM_BINS` magnitude bins.
pub const FFT_SIZE: usize = 512;

// Byte-scale mapping range: magnitudes at or below MIN_DB read as 0,
// at or above MAX_DB as 255.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// Turns a window of PCM samples into frequency-domain magnitudes on a
/// 0..=255 byte scale, Hann-windowed to limit spectral leakage.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let hann = (0..FFT_SIZE)
            .map(|i| {
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos())
            })
            .collect();
        Self {
            fft,
            hann,
            buffer: vec![Complex::default(); FFT_SIZE],
        }
    }

    /// Analyze the most recent window. Shorter input is zero-padded at the
    /// front, so a just-opened stream reads as silence.
    pub fn analyze(&mut self, samples: &[f32]) -> SpectrumFrame {
        let tail = &samples[samples.len().saturating_sub(FFT_SIZE)..];
        let pad = FFT_SIZE - tail.len();

        for slot in self.buffer.iter_mut().take(pad) {
            *slot = Complex::default();
        }
        for (i, &sample) in tail.iter().enumerate() {
            self.buffer[pad + i] = Complex::new(sample * self.hann[pad + i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let bins = self.buffer[..SPECTRUM_BINS]
            .iter()
            .map(|c| {
                let magnitude = c.norm() / (FFT_SIZE as f32 / 2.0);
                let db = 20.0 * magnitude.max(1e-10).log10();
                ((db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0).clamp(0.0, 255.0)
            })
            .collect();

        SpectrumFrame::new(bins)
    }
}

/// Analysis tap over the rolling sample window a capture backend maintains.
/// Reports the source as gone once the backend closes.
pub struct SharedWindowTap {
    window: Arc<Mutex<VecDeque<f32>>>,
    closed: Arc<AtomicBool>,
    analyzer: SpectrumAnalyzer,
}

impl SharedWindowTap {
    pub fn new(window: Arc<Mutex<VecDeque<f32>>>, closed: Arc<AtomicBool>) -> Self {
        Self {
            window,
            closed,
            analyzer: SpectrumAnalyzer::new(),
        }
    }
}

impl SpectrumSource for SharedWindowTap {
    fn sample(&mut self) -> Option<SpectrumFrame> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        let samples: Vec<f32> = self.window.lock().iter().copied().collect();
        Some(self.analyzer.analyze(&samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn silence_reads_as_zero_energy() {
        let mut analyzer = SpectrumAnalyzer::new();
        let frame = analyzer.analyze(&vec![0.0; FFT_SIZE]);
        assert_eq!(frame.bins().len(), SPECTRUM_BINS);
        assert!(frame.mean_magnitude() < 1.0);
    }

    #[test]
    fn loud_broadband_input_clears_the_default_threshold() {
        let mut rng = StdRng::seed_from_u64(7);
        let samples: Vec<f32> = (0..FFT_SIZE).map(|_| rng.gen_range(-0.5..0.5)).collect();

        let mut analyzer = SpectrumAnalyzer::new();
        let frame = analyzer.analyze(&samples);
        assert!(
            frame.mean_magnitude() > lingovox_vad::DEFAULT_THRESHOLD_ENERGY,
            "mean was {}",
            frame.mean_magnitude()
        );
    }

    #[test]
    fn short_input_is_padded_not_rejected() {
        let mut analyzer = SpectrumAnalyzer::new();
        let frame = analyzer.analyze(&[0.1; 64]);
        assert_eq!(frame.bins().len(), SPECTRUM_BINS);
    }

    #[test]
    fn tap_reports_closed_sources() {
        let window = Arc::new(Mutex::new(VecDeque::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let mut tap = SharedWindowTap::new(window, closed.clone());

        assert!(tap.sample().is_some());
        closed.store(true, Ordering::Release);
        assert!(tap.sample().is_none());
    }
}
