use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use lingovox_telemetry::PipelineMetrics;

use crate::config::SilenceConfig;
use crate::detector::{EndpointDetector, FrameVerdict};
use crate::types::{SpectrumFrame, VadEvent};

/// Live source of analysis frames, injected so tests can script the
/// microphone. `None` means the source is gone; the monitor then exits
/// without firing.
pub trait SpectrumSource: Send {
    fn sample(&mut self) -> Option<SpectrumFrame>;
}

/// Handle to a running silence monitor. Stopping it never emits an event.
pub struct SilenceMonitorHandle {
    task: JoinHandle<()>,
}

impl SilenceMonitorHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Samples a spectrum source at a fixed interval, classifies frames against
/// the energy threshold and fires `VadEvent::Endpoint` once sustained
/// silence follows detected speech.
///
/// Detection runs until stopped: there is no maximum duration. A recording
/// in which speech is never detected stays quiescent forever and must be
/// stopped externally.
pub struct SilenceMonitor;

impl SilenceMonitor {
    pub fn spawn(
        mut source: Box<dyn SpectrumSource>,
        config: SilenceConfig,
        event_tx: mpsc::Sender<VadEvent>,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> SilenceMonitorHandle {
        let task = tokio::spawn(async move {
            let started = Instant::now();
            let mut detector = EndpointDetector::new(config);
            let mut ticker = time::interval(config.frame_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // The deadline arm races the next frame: speech observed on a
                // later tick clears it before it can fire.
                let deadline = detector.silence_deadline();

                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(frame) = source.sample() else {
                            debug!(target: "vad", "spectrum source closed, monitor exiting");
                            return;
                        };
                        let now = Instant::now();
                        let mean = frame.mean_magnitude();
                        if let Some(m) = &metrics {
                            m.record_frame(mean);
                        }
                        match detector.observe(mean, now) {
                            FrameVerdict::Speech { first: true } => {
                                debug!(target: "vad", mean, "speech detected");
                                if let Some(m) = &metrics {
                                    m.record_speech_start();
                                }
                                let event = VadEvent::SpeechStart {
                                    timestamp_ms: ms_since(started, now),
                                };
                                if event_tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                            FrameVerdict::TrailingSilence { started: silence_start }
                                if silence_start == now =>
                            {
                                trace!(target: "vad", mean, "silence window armed");
                            }
                            _ => {}
                        }
                    }
                    _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                        let now = Instant::now();
                        let silence_started = detector
                            .silence_started_at()
                            .unwrap_or(now);
                        debug!(
                            target: "vad",
                            after_ms = ms_since(silence_started, now),
                            "sustained silence confirmed"
                        );
                        if let Some(m) = &metrics {
                            m.record_endpoint();
                        }
                        let _ = event_tx
                            .send(VadEvent::Endpoint {
                                timestamp_ms: ms_since(started, now),
                                silence_started_ms: ms_since(started, silence_started),
                            })
                            .await;
                        // exactly once per recording
                        return;
                    }
                }
            }
        });

        SilenceMonitorHandle { task }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        // unreachable behind the select guard, but keep the future total
        None => std::future::pending().await,
    }
}

fn ms_since(earlier: Instant, later: Instant) -> u64 {
    later.saturating_duration_since(earlier).as_millis() as u64
}
