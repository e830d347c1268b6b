use lingovox_foundation::DeviceError;
use lingovox_vad::SpectrumSource;

/// Format of the PCM delivered by an open capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One exclusive microphone acquisition. The chunk stream and the analysis
/// tap both hang off the same opened device: recording buffers bytes while
/// the silence monitor watches the spectrum, and releasing the stream
/// releases the microphone for everyone.
pub struct OpenCapture {
    pub stream: Box<dyn CaptureStream>,
    pub analysis: Box<dyn SpectrumSource>,
}

/// Capability to open the capture device. Injected at construction so tests
/// substitute a fake source instead of reaching for platform audio.
pub trait CaptureDevice: Send + Sync {
    fn open(&self) -> Result<OpenCapture, DeviceError>;
}

/// An open microphone stream delivering encoded audio chunks.
pub trait CaptureStream: Send {
    fn format(&self) -> CaptureFormat;

    /// Drain the 16-bit LE PCM captured since the previous call.
    fn read_chunk(&mut self) -> Result<Vec<u8>, DeviceError>;
}
