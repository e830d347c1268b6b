pub mod config;
pub mod constants;
pub mod detector;
pub mod energy;
pub mod monitor;
pub mod types;

pub use config::SilenceConfig;
pub use constants::{
    DEFAULT_FRAME_INTERVAL_MS, DEFAULT_SILENCE_DURATION_MS, DEFAULT_THRESHOLD_ENERGY,
    SPECTRUM_BINS,
};
pub use detector::{EndpointDetector, FrameVerdict};
pub use monitor::{SilenceMonitor, SilenceMonitorHandle, SpectrumSource};
pub use types::{SpectrumFrame, VadEvent};
