use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use async_trait::async_trait;
use parking_lot::Mutex;
use rodio::{Decoder, OutputStream, Sink};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::artifact::AudioArtifact;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("No audio output available: {0}")]
    Output(String),

    #[error("Reply audio could not be decoded: {0}")]
    Decode(String),

    #[error("Playback worker is gone")]
    WorkerGone,
}

/// Plays one reply artifact at a time. `play` resolves when playback has
/// finished or was stopped; `stop` cancels whatever is in progress.
#[async_trait]
pub trait PlaybackSink: Send + Sync {
    async fn play(&self, artifact: AudioArtifact) -> Result<(), PlaybackError>;
    fn stop(&self);
}

enum PlaybackCommand {
    Play {
        bytes: Vec<u8>,
        done: oneshot::Sender<Result<(), PlaybackError>>,
    },
}

/// Speaker output backed by rodio. The rodio output stream is not `Send`,
/// so a dedicated thread owns it and playback requests arrive over a
/// channel; completion is reported through a oneshot per request.
pub struct RodioPlayback {
    command_tx: crossbeam_channel::Sender<PlaybackCommand>,
    current: Arc<Mutex<Option<Arc<Sink>>>>,
}

impl RodioPlayback {
    pub fn new() -> Result<Self, PlaybackError> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded::<PlaybackCommand>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), PlaybackError>>(1);
        let current: Arc<Mutex<Option<Arc<Sink>>>> = Arc::new(Mutex::new(None));
        let worker_current = current.clone();

        thread::Builder::new()
            .name("lingovox-playback".to_string())
            .spawn(move || {
                let (stream, handle) = match OutputStream::try_default() {
                    Ok(pair) => {
                        let _ = ready_tx.send(Ok(()));
                        pair
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(PlaybackError::Output(e.to_string())));
                        return;
                    }
                };
                info!(target: "audio", "playback output ready");

                while let Ok(PlaybackCommand::Play { bytes, done }) = command_rx.recv() {
                    let result = play_blocking(&handle, bytes, &worker_current);
                    *worker_current.lock() = None;
                    let _ = done.send(result);
                }

                drop(stream);
                debug!(target: "audio", "playback worker exiting");
            })
            .map_err(|e| PlaybackError::Output(format!("failed to spawn playback thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| PlaybackError::WorkerGone)??;

        Ok(Self {
            command_tx,
            current,
        })
    }
}

fn play_blocking(
    handle: &rodio::OutputStreamHandle,
    bytes: Vec<u8>,
    current: &Arc<Mutex<Option<Arc<Sink>>>>,
) -> Result<(), PlaybackError> {
    let sink = Sink::try_new(handle).map_err(|e| PlaybackError::Output(e.to_string()))?;
    let source = Decoder::new(Cursor::new(bytes)).map_err(|e| PlaybackError::Decode(e.to_string()))?;
    sink.append(source);

    // publish the sink before blocking so stop() can cancel mid-play; the
    // lock is never held across the wait
    let sink = Arc::new(sink);
    *current.lock() = Some(sink.clone());
    sink.sleep_until_end();
    Ok(())
}

#[async_trait]
impl PlaybackSink for RodioPlayback {
    async fn play(&self, artifact: AudioArtifact) -> Result<(), PlaybackError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.command_tx
            .send(PlaybackCommand::Play {
                bytes: artifact.into_bytes(),
                done: done_tx,
            })
            .map_err(|_| PlaybackError::WorkerGone)?;
        done_rx.await.map_err(|_| PlaybackError::WorkerGone)?
    }

    fn stop(&self) {
        if let Some(sink) = self.current.lock().as_ref() {
            debug!(target: "audio", "stopping playback");
            sink.stop();
        }
    }
}
