use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use lingovox_foundation::DeviceError;
use lingovox_telemetry::PipelineMetrics;
use lingovox_vad::SpectrumSource;

use crate::artifact::AudioArtifact;
use crate::capture::{CaptureDevice, CaptureFormat, CaptureStream, OpenCapture};

/// Interval at which captured audio is flushed into the session buffer.
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 250;

/// Owns the microphone for one turn: accumulates encoded chunks at a fixed
/// interval while active and finalizes them into a single artifact on stop.
///
/// A stopped session never resumes; a new turn always creates a new session.
pub struct RecordingSession {
    stream: Arc<Mutex<Option<Box<dyn CaptureStream>>>>,
    buffer: Arc<Mutex<Vec<u8>>>,
    format: CaptureFormat,
    pump: Option<JoinHandle<()>>,
    analysis: Option<Box<dyn SpectrumSource>>,
}

impl RecordingSession {
    /// Acquire the capture device and start buffering. Acquisition failure
    /// is surfaced to the caller; no state is left behind.
    pub fn start(
        device: &dyn CaptureDevice,
        chunk_interval: Duration,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<Self, DeviceError> {
        let OpenCapture { stream, analysis } = device.open()?;
        let format = stream.format();

        let stream = Arc::new(Mutex::new(Some(stream)));
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let pump = tokio::spawn(pump_chunks(
            stream.clone(),
            buffer.clone(),
            chunk_interval,
            metrics,
        ));

        debug!(
            target: "audio",
            sample_rate = format.sample_rate,
            channels = format.channels,
            "recording session started"
        );

        Ok(Self {
            stream,
            buffer,
            format,
            pump: Some(pump),
            analysis: Some(analysis),
        })
    }

    /// The spectrum tap of this acquisition, handed to the silence monitor.
    pub fn take_analysis(&mut self) -> Option<Box<dyn SpectrumSource>> {
        self.analysis.take()
    }

    pub fn is_active(&self) -> bool {
        self.pump.is_some()
    }

    /// Finalize the buffered chunks into one artifact, releasing the capture
    /// device before returning. Idempotent-safe: calling again once stopped
    /// is a no-op that returns `None`.
    pub fn stop(&mut self) -> Option<AudioArtifact> {
        let pump = self.pump.take()?;
        pump.abort();
        self.analysis = None;

        // Drain whatever arrived since the last flush, then drop the stream
        // so the device is released before the artifact leaves this session.
        let mut guard = self.stream.lock();
        if let Some(mut stream) = guard.take() {
            match stream.read_chunk() {
                Ok(tail) => self.buffer.lock().extend_from_slice(&tail),
                Err(e) => warn!(target: "audio", "final chunk drain failed: {e}"),
            }
        }
        drop(guard);

        let pcm = std::mem::take(&mut *self.buffer.lock());
        debug!(target: "audio", pcm_bytes = pcm.len(), "recording finalized");
        Some(finalize_wav(&pcm, self.format))
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        // Forced exits release the device the same way as a regular stop.
        if self.pump.is_some() {
            let _ = self.stop();
        }
    }
}

async fn pump_chunks(
    stream: Arc<Mutex<Option<Box<dyn CaptureStream>>>>,
    buffer: Arc<Mutex<Vec<u8>>>,
    chunk_interval: Duration,
    metrics: Option<Arc<PipelineMetrics>>,
) {
    let mut ticker = time::interval(chunk_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // nothing has been captured yet; skip the immediate tick
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let chunk = {
            let mut guard = stream.lock();
            let Some(stream) = guard.as_mut() else {
                return;
            };
            match stream.read_chunk() {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(target: "audio", "chunk read failed: {e}");
                    return;
                }
            }
        };

        if !chunk.is_empty() {
            buffer.lock().extend_from_slice(&chunk);
            if let Some(m) = &metrics {
                m.record_chunk();
            }
        }
    }
}

fn finalize_wav(pcm: &[u8], format: CaptureFormat) -> AudioArtifact {
    let spec = hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + pcm.len()));
    let written = (|| -> Result<(), hound::Error> {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([sample[0], sample[1]]))?;
        }
        writer.finalize()
    })();

    match written {
        Ok(()) => AudioArtifact::wav(cursor.into_inner()),
        Err(e) => {
            // an in-memory WAV write should not fail; an empty artifact is
            // discarded downstream instead of poisoning the pipeline
            tracing::error!(target: "audio", "wav finalization failed: {e}");
            AudioArtifact::wav(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lingovox_vad::{SpectrumFrame, SpectrumSource};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeTap;

    impl SpectrumSource for FakeTap {
        fn sample(&mut self) -> Option<SpectrumFrame> {
            Some(SpectrumFrame::uniform(0.0, 4))
        }
    }

    struct FakeStream {
        chunks: Vec<Vec<u8>>,
        next: usize,
        released: Arc<AtomicBool>,
    }

    impl CaptureStream for FakeStream {
        fn format(&self) -> CaptureFormat {
            CaptureFormat {
                sample_rate: 16_000,
                channels: 1,
            }
        }

        fn read_chunk(&mut self) -> Result<Vec<u8>, DeviceError> {
            let chunk = self.chunks.get(self.next).cloned().unwrap_or_default();
            self.next += 1;
            Ok(chunk)
        }
    }

    impl Drop for FakeStream {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct FakeDevice {
        chunks: Vec<Vec<u8>>,
        released: Arc<AtomicBool>,
        deny: bool,
    }

    impl FakeDevice {
        fn new(chunks: Vec<Vec<u8>>) -> Self {
            Self {
                chunks,
                released: Arc::new(AtomicBool::new(false)),
                deny: false,
            }
        }
    }

    impl CaptureDevice for FakeDevice {
        fn open(&self) -> Result<OpenCapture, DeviceError> {
            if self.deny {
                return Err(DeviceError::AccessDenied);
            }
            Ok(OpenCapture {
                stream: Box::new(FakeStream {
                    chunks: self.chunks.clone(),
                    next: 0,
                    released: self.released.clone(),
                }),
                analysis: Box::new(FakeTap),
            })
        }
    }

    const INTERVAL: Duration = Duration::from_millis(250);

    #[tokio::test(start_paused = true)]
    async fn accumulates_chunks_and_finalizes_one_wav() {
        let device = FakeDevice::new(vec![vec![1u8; 600], vec![2u8; 600]]);
        let mut session = RecordingSession::start(&device, INTERVAL, None).unwrap();
        assert!(session.is_active());

        tokio::time::sleep(Duration::from_millis(600)).await;

        let artifact = session.stop().expect("first stop yields the artifact");
        // 44-byte RIFF header plus two flushed chunks
        assert_eq!(artifact.len(), 44 + 1_200);
        assert_eq!(artifact.mime(), "audio/wav");
        assert!(device.released.load(Ordering::SeqCst));
        assert!(!session.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let device = FakeDevice::new(vec![vec![0u8; 100]]);
        let mut session = RecordingSession::start(&device, INTERVAL, None).unwrap();

        assert!(session.stop().is_some());
        assert!(session.stop().is_none());
        assert!(session.stop().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_the_first_flush_drains_the_tail() {
        // manual stop right after start must not lose captured audio
        let device = FakeDevice::new(vec![vec![7u8; 1_200]]);
        let mut session = RecordingSession::start(&device, INTERVAL, None).unwrap();

        let artifact = session.stop().unwrap();
        assert_eq!(artifact.len(), 44 + 1_200);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_an_active_session_releases_the_device() {
        let device = FakeDevice::new(vec![]);
        let session = RecordingSession::start(&device, INTERVAL, None).unwrap();
        drop(session);
        assert!(device.released.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn acquisition_failure_surfaces_to_the_caller() {
        let mut device = FakeDevice::new(vec![]);
        device.deny = true;
        let result = RecordingSession::start(&device, INTERVAL, None);
        assert!(matches!(result, Err(DeviceError::AccessDenied)));
    }

    #[tokio::test(start_paused = true)]
    async fn analysis_tap_is_taken_once() {
        let device = FakeDevice::new(vec![]);
        let mut session = RecordingSession::start(&device, INTERVAL, None).unwrap();
        assert!(session.take_analysis().is_some());
        assert!(session.take_analysis().is_none());
    }
}
