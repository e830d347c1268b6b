use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;
use tracing::{info, warn};

use lingovox_foundation::DeviceError;

use crate::capture::{CaptureDevice, CaptureFormat, CaptureStream, OpenCapture};
use crate::spectrum::{SharedWindowTap, FFT_SIZE};

/// Real microphone backed by cpal. The cpal stream is not `Send`, so each
/// acquisition runs on a dedicated thread that owns the stream and is joined
/// when the capture stream is dropped.
pub struct CpalCaptureDevice {
    device_name: Option<String>,
}

impl CpalCaptureDevice {
    pub fn new(device_name: Option<String>) -> Self {
        Self { device_name }
    }
}

impl CaptureDevice for CpalCaptureDevice {
    fn open(&self) -> Result<OpenCapture, DeviceError> {
        let pcm = Arc::new(Mutex::new(Vec::<u8>::new()));
        let window = Arc::new(Mutex::new(VecDeque::<f32>::with_capacity(FFT_SIZE)));
        let shutdown = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let device_name = self.device_name.clone();
        let thread_pcm = pcm.clone();
        let thread_window = window.clone();
        let thread_shutdown = shutdown.clone();
        let thread_closed = closed.clone();

        let handle = thread::Builder::new()
            .name("lingovox-capture".to_string())
            .spawn(move || {
                run_capture(
                    device_name,
                    thread_pcm,
                    thread_window,
                    thread_shutdown,
                    thread_closed,
                    ready_tx,
                );
            })
            .map_err(|e| DeviceError::Stream(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(format)) => Ok(OpenCapture {
                stream: Box::new(CpalCaptureStream {
                    format,
                    pcm,
                    shutdown,
                    thread: Some(handle),
                }),
                analysis: Box::new(SharedWindowTap::new(window, closed)),
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                Err(DeviceError::Stream(
                    "capture thread did not report readiness in time".to_string(),
                ))
            }
        }
    }
}

struct CpalCaptureStream {
    format: CaptureFormat,
    pcm: Arc<Mutex<Vec<u8>>>,
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream for CpalCaptureStream {
    fn format(&self) -> CaptureFormat {
        self.format
    }

    fn read_chunk(&mut self) -> Result<Vec<u8>, DeviceError> {
        Ok(std::mem::take(&mut *self.pcm.lock()))
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_capture(
    device_name: Option<String>,
    pcm: Arc<Mutex<Vec<u8>>>,
    window: Arc<Mutex<VecDeque<f32>>>,
    shutdown: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    ready_tx: crossbeam_channel::Sender<Result<CaptureFormat, DeviceError>>,
) {
    let outcome = (|| -> Result<(cpal::Stream, CaptureFormat), DeviceError> {
        let host = cpal::default_host();
        let device = match &device_name {
            Some(name) => host
                .input_devices()
                .map_err(|e| DeviceError::Stream(e.to_string()))?
                .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
                .ok_or_else(|| DeviceError::NotFound {
                    name: Some(name.clone()),
                })?,
            None => host
                .default_input_device()
                .ok_or(DeviceError::NotFound { name: None })?,
        };

        let supported = device
            .default_input_config()
            .map_err(|e| DeviceError::FormatNotSupported(e.to_string()))?;
        let sample_format = supported.sample_format();
        let config = supported.config();
        let channels = config.channels as usize;
        let format = CaptureFormat {
            sample_rate: config.sample_rate.0,
            channels: 1, // downmixed below
        };

        let err_fn = |e: cpal::StreamError| warn!(target: "audio", "capture stream error: {e}");

        let stream = match sample_format {
            SampleFormat::F32 => device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _| ingest(data, channels, &pcm, &window),
                    err_fn,
                    None,
                )
                .map_err(|e| DeviceError::Stream(e.to_string()))?,
            SampleFormat::I16 => device
                .build_input_stream(
                    &config,
                    move |data: &[i16], _| {
                        let floats: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32_768.0).collect();
                        ingest(&floats, channels, &pcm, &window);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| DeviceError::Stream(e.to_string()))?,
            other => {
                return Err(DeviceError::FormatNotSupported(format!("{other:?}")));
            }
        };

        stream
            .play()
            .map_err(|e| DeviceError::Stream(e.to_string()))?;

        let name = device.name().unwrap_or_else(|_| "<unnamed>".into());
        info!(
            target: "audio",
            device = %name,
            sample_rate = format.sample_rate,
            "capture stream started"
        );

        Ok((stream, format))
    })();

    match outcome {
        Ok((stream, format)) => {
            let _ = ready_tx.send(Ok(format));
            while !shutdown.load(Ordering::SeqCst) {
                thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
            closed.store(true, Ordering::Release);
        }
        Err(e) => {
            closed.store(true, Ordering::Release);
            let _ = ready_tx.send(Err(e));
        }
    }
}

/// Downmix to mono, append 16-bit LE bytes for the recording buffer and keep
/// the most recent FFT window for the analysis tap.
fn ingest(
    data: &[f32],
    channels: usize,
    pcm: &Arc<Mutex<Vec<u8>>>,
    window: &Arc<Mutex<VecDeque<f32>>>,
) {
    if channels == 0 {
        return;
    }

    let mut bytes = Vec::with_capacity(data.len() / channels * 2);
    let mut mono = Vec::with_capacity(data.len() / channels);
    for frame in data.chunks(channels) {
        let sample = frame.iter().sum::<f32>() / channels as f32;
        mono.push(sample);
        let quantized = (sample.clamp(-1.0, 1.0) * 32_767.0) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    pcm.lock().extend_from_slice(&bytes);

    let mut window = window.lock();
    for sample in mono {
        if window.len() == FFT_SIZE {
            window.pop_front();
        }
        window.push_back(sample);
    }
}
