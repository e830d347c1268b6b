pub mod artifact;
pub mod capture;
pub mod device;
pub mod playback;
pub mod recorder;
pub mod spectrum;

pub use artifact::{AudioArtifact, MIN_UTTERANCE_BYTES};
pub use capture::{CaptureDevice, CaptureFormat, CaptureStream, OpenCapture};
pub use device::CpalCaptureDevice;
pub use playback::{PlaybackError, PlaybackSink, RodioPlayback};
pub use recorder::{RecordingSession, DEFAULT_CHUNK_INTERVAL_MS};
pub use spectrum::SpectrumAnalyzer;
