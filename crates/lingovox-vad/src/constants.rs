//! Analysis constants for the silence detector

/// Magnitude bins per analysis frame (half of a 512-point FFT).
pub const SPECTRUM_BINS: usize = 256;

/// Default mean-magnitude threshold separating speech from silence,
/// on the 0..=255 byte scale produced by the analysis tap.
pub const DEFAULT_THRESHOLD_ENERGY: f32 = 15.0;

/// Default sustained-silence window that confirms an endpoint.
pub const DEFAULT_SILENCE_DURATION_MS: u64 = 1_800;

/// Default sampling interval for analysis frames.
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 250;
