use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use lingovox_audio::{AudioArtifact, CaptureDevice, PlaybackSink, RecordingSession};
use lingovox_foundation::{ConversationState, ConversationStateMachine, DeviceError};
use lingovox_telemetry::PipelineMetrics;
use lingovox_vad::{SilenceConfig, SilenceMonitor, SilenceMonitorHandle, VadEvent};

use crate::config::AppConfig;
use crate::pipeline::{PipelineError, TurnOutcome, TurnPipeline};
use crate::session::DialogSession;

/// Assistant turn appended when a remote stage fails, so the conversation
/// can continue instead of silently retrying.
pub const APOLOGY_TEXT: &str =
    "Entschuldigung, es gab ein technisches Problem. Bitte versuche es nochmal.";

/// Everything that can move the conversation forward arrives here as one of
/// these, handled strictly one at a time.
#[derive(Debug)]
pub enum ConversationEvent {
    /// The learner pressed the mic control. Starts from Idle, commits the
    /// utterance early from Listening, pauses from Processing/Speaking.
    MicPressed,
    /// The learner ended the conversation.
    Pause,
    /// Voice activity from the silence monitor of listening epoch `epoch`.
    Vad { epoch: u64, event: VadEvent },
    /// The turn pipeline spawned in epoch `epoch` completed.
    TurnFinished {
        epoch: u64,
        outcome: Result<TurnOutcome, PipelineError>,
    },
    /// Reply playback of epoch `epoch` came to an end.
    PlaybackFinished { epoch: u64 },
    /// Tear the event loop down.
    Shutdown,
}

/// Single source of truth for what the system is doing, and the only place
/// that starts or stops recording, the pipeline and playback. Exactly one
/// of those three is active at any time.
pub struct ConversationController {
    machine: ConversationStateMachine,
    device: Arc<dyn CaptureDevice>,
    playback: Arc<dyn PlaybackSink>,
    pipeline: Arc<TurnPipeline>,
    session: Arc<Mutex<DialogSession>>,
    silence: SilenceConfig,
    chunk_interval: Duration,
    min_utterance_bytes: usize,
    metrics: Arc<PipelineMetrics>,

    event_tx: mpsc::Sender<ConversationEvent>,
    event_rx: mpsc::Receiver<ConversationEvent>,

    recording: Option<RecordingSession>,
    monitor: Option<SilenceMonitorHandle>,
    vad_forward: Option<JoinHandle<()>>,

    /// Bumped on every new listening session and on pause; completions
    /// carrying an older epoch are stale and get discarded.
    epoch: u64,
}

impl ConversationController {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        playback: Arc<dyn PlaybackSink>,
        pipeline: Arc<TurnPipeline>,
        config: &AppConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(32);
        Self {
            machine: ConversationStateMachine::new(),
            device,
            playback,
            pipeline,
            session: Arc::new(Mutex::new(DialogSession::new(config.context.clone()))),
            silence: config.silence,
            chunk_interval: config.chunk_interval(),
            min_utterance_bytes: config.min_utterance_bytes,
            metrics,
            event_tx,
            event_rx,
            recording: None,
            monitor: None,
            vad_forward: None,
            epoch: 0,
        }
    }

    pub fn sender(&self) -> mpsc::Sender<ConversationEvent> {
        self.event_tx.clone()
    }

    pub fn state(&self) -> ConversationState {
        self.machine.current()
    }

    pub fn session(&self) -> Arc<Mutex<DialogSession>> {
        self.session.clone()
    }

    /// Receive the next event. `run` is this in a loop; tests drive the
    /// controller event by event instead.
    pub async fn next_event(&mut self) -> Option<ConversationEvent> {
        self.event_rx.recv().await
    }

    pub async fn run(mut self) {
        while let Some(event) = self.next_event().await {
            if matches!(event, ConversationEvent::Shutdown) {
                self.pause().await;
                info!(target: "controller", "shutting down");
                break;
            }
            self.handle(event).await;
        }
    }

    pub async fn handle(&mut self, event: ConversationEvent) {
        // Completions of superseded work are discarded, never acted on.
        match &event {
            ConversationEvent::Vad { epoch, .. }
            | ConversationEvent::TurnFinished { epoch, .. }
            | ConversationEvent::PlaybackFinished { epoch }
                if *epoch != self.epoch =>
            {
                debug!(target: "controller", epoch, "stale completion discarded");
                return;
            }
            _ => {}
        }

        use ConversationEvent::*;
        use ConversationState::*;

        match (self.machine.current(), event) {
            (Idle, MicPressed) => self.begin_conversation().await,
            (Listening, MicPressed) => self.finish_utterance().await,
            (Processing | Speaking, MicPressed) => self.pause().await,
            (_, Pause) => self.pause().await,

            (
                Listening,
                Vad {
                    event: VadEvent::SpeechStart { timestamp_ms },
                    ..
                },
            ) => {
                debug!(target: "controller", timestamp_ms, "learner started speaking");
            }
            (
                Listening,
                Vad {
                    event: VadEvent::Endpoint { .. },
                    ..
                },
            ) => self.finish_utterance().await,

            (Processing, TurnFinished { outcome, .. }) => self.finish_turn(outcome).await,
            (Speaking, PlaybackFinished { .. }) => self.resume_listening().await,

            (state, event) => {
                debug!(target: "controller", ?state, ?event, "event ignored in this state")
            }
        }
    }

    async fn begin_conversation(&mut self) {
        match self.start_listening() {
            Ok(()) => {
                if let Err(e) = self.machine.transition(ConversationState::Listening) {
                    error!(target: "controller", "{e}");
                }
            }
            Err(e) => {
                // surfaced to the learner; state stays Idle
                error!(target: "controller", "microphone unavailable: {e}");
            }
        }
    }

    /// Open a fresh capture acquisition and arm the silence monitor on its
    /// analysis tap. A stopped session is never reused.
    fn start_listening(&mut self) -> Result<(), DeviceError> {
        self.epoch += 1;
        let epoch = self.epoch;

        let mut recording = RecordingSession::start(
            self.device.as_ref(),
            self.chunk_interval,
            Some(self.metrics.clone()),
        )?;
        let analysis = recording
            .take_analysis()
            .ok_or_else(|| DeviceError::Stream("capture provided no analysis tap".to_string()))?;

        let (vad_tx, mut vad_rx) = mpsc::channel(16);
        let monitor = SilenceMonitor::spawn(
            analysis,
            self.silence,
            vad_tx,
            Some(self.metrics.clone()),
        );

        let event_tx = self.event_tx.clone();
        let forward = tokio::spawn(async move {
            while let Some(event) = vad_rx.recv().await {
                if event_tx
                    .send(ConversationEvent::Vad { epoch, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        self.recording = Some(recording);
        self.monitor = Some(monitor);
        self.vad_forward = Some(forward);
        Ok(())
    }

    /// Stop the monitor and finalize the recording. Always releases the
    /// capture device before anything else may run.
    fn stop_listening(&mut self) -> Option<AudioArtifact> {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
        if let Some(forward) = self.vad_forward.take() {
            forward.abort();
        }
        self.recording.take().and_then(|mut recording| recording.stop())
    }

    /// Endpoint fired or the learner stopped manually: finalize the
    /// utterance and either hand it to the pipeline or discard it.
    async fn finish_utterance(&mut self) {
        match self.stop_listening() {
            Some(artifact) if artifact.is_substantial(self.min_utterance_bytes) => {
                if let Err(e) = self.machine.transition(ConversationState::Processing) {
                    error!(target: "controller", "{e}");
                    return;
                }
                let epoch = self.epoch;
                let pipeline = self.pipeline.clone();
                let session = self.session.clone();
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    let outcome = {
                        let mut session = session.lock().await;
                        pipeline.run(artifact, &mut session).await
                    };
                    let _ = event_tx
                        .send(ConversationEvent::TurnFinished { epoch, outcome })
                        .await;
                });
            }
            artifact => {
                if let Some(artifact) = artifact {
                    debug!(
                        target: "controller",
                        bytes = artifact.len(),
                        "utterance too short, discarded"
                    );
                    self.metrics.record_discarded_utterance();
                }
                // no turn to process: re-arm listening with a new session
                self.resume_listening().await;
            }
        }
    }

    async fn finish_turn(&mut self, outcome: Result<TurnOutcome, PipelineError>) {
        match outcome {
            Ok(TurnOutcome::Reply { text, has_audio }) => {
                info!(target: "controller", "assistant: {text}");
                if has_audio {
                    let audio = self.session.lock().await.take_reply_audio();
                    if let Some(artifact) = audio {
                        self.begin_speaking(artifact);
                        return;
                    }
                }
                // text-only turn: straight back to listening, no speaking phase
                self.resume_listening().await;
            }
            Ok(TurnOutcome::NothingSaid) => {
                debug!(target: "controller", "nothing transcribed, listening again");
                self.resume_listening().await;
            }
            Err(error) => {
                warn!(target: "controller", "turn failed: {error}");
                match &error {
                    PipelineError::Transcription(_) => {
                        self.metrics
                            .transcription_failures
                            .fetch_add(1, Ordering::Relaxed);
                    }
                    PipelineError::Generation(_) => {
                        self.metrics
                            .generation_failures
                            .fetch_add(1, Ordering::Relaxed);
                    }
                }
                // surfaced once as a conversational turn, no silent retry
                self.session.lock().await.push_assistant(APOLOGY_TEXT, None);
                self.resume_listening().await;
            }
        }
    }

    fn begin_speaking(&mut self, artifact: AudioArtifact) {
        if let Err(e) = self.machine.transition(ConversationState::Speaking) {
            error!(target: "controller", "{e}");
            return;
        }
        let epoch = self.epoch;
        let playback = self.playback.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = playback.play(artifact).await {
                warn!(target: "controller", "playback failed: {e}");
            }
            let _ = event_tx
                .send(ConversationEvent::PlaybackFinished { epoch })
                .await;
        });
    }

    async fn resume_listening(&mut self) {
        match self.start_listening() {
            Ok(()) => {
                if let Err(e) = self.machine.transition(ConversationState::Listening) {
                    error!(target: "controller", "{e}");
                }
            }
            Err(e) => {
                error!(target: "controller", "microphone unavailable: {e}");
                let _ = self.machine.transition(ConversationState::Idle);
            }
        }
    }

    /// Pause: stop the monitor and discard the capture, let any in-flight
    /// pipeline run out without acting on its result, stop playback.
    async fn pause(&mut self) {
        if self.machine.current() == ConversationState::Idle {
            return;
        }
        info!(target: "controller", "conversation paused");
        let _ = self.stop_listening();
        self.epoch += 1;
        self.playback.stop();
        let _ = self.machine.transition(ConversationState::Idle);
    }
}
