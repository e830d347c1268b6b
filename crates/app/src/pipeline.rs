use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use lingovox_audio::AudioArtifact;
use lingovox_services::{
    DialogueGenerator, GenerationError, SpeechSynthesis, SpeechToText, TranscriptionError,
};
use lingovox_telemetry::PipelineMetrics;

use crate::session::DialogSession;

/// Failure of a stage that cannot degrade gracefully. Synthesis failures
/// never end up here; they downgrade the turn to text-only instead.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transcription failed: {0}")]
    Transcription(#[from] TranscriptionError),

    #[error("reply generation failed: {0}")]
    Generation(#[from] GenerationError),
}

#[derive(Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Transcription came back empty: nothing worth answering. The
    /// transcript was not touched and the generator was never invoked.
    NothingSaid,
    /// Reply appended to the transcript; `has_audio` is false when
    /// synthesis failed and the turn degraded to text-only.
    Reply { text: String, has_audio: bool },
}

/// Chains the remote stages for one learner utterance, strictly in order:
/// transcribe, then generate against the full transcript, then synthesize.
pub struct TurnPipeline {
    transcriber: Arc<dyn SpeechToText>,
    generator: Arc<dyn DialogueGenerator>,
    synthesizer: Arc<dyn SpeechSynthesis>,
    language: String,
    metrics: Arc<PipelineMetrics>,
}

impl TurnPipeline {
    pub fn new(
        transcriber: Arc<dyn SpeechToText>,
        generator: Arc<dyn DialogueGenerator>,
        synthesizer: Arc<dyn SpeechSynthesis>,
        language: impl Into<String>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            transcriber,
            generator,
            synthesizer,
            language: language.into(),
            metrics,
        }
    }

    pub async fn run(
        &self,
        artifact: AudioArtifact,
        session: &mut DialogSession,
    ) -> Result<TurnOutcome, PipelineError> {
        let started = Instant::now();

        let text = self
            .transcriber
            .transcribe(&artifact, &self.language)
            .await?;
        // the utterance audio is not needed past transcription
        drop(artifact);

        let text = text.trim();
        if text.is_empty() {
            debug!(target: "pipeline", "empty transcription, skipping turn");
            return Ok(TurnOutcome::NothingSaid);
        }

        info!(target: "pipeline", "learner: {text}");
        session.push_user(text);

        let reply = self
            .generator
            .reply(session.transcript(), session.context())
            .await?;

        let audio = match self.synthesizer.synthesize(&reply).await {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                // text-only degradation: the reply still reaches the learner
                warn!(target: "pipeline", "synthesis failed, continuing without audio: {e}");
                self.metrics
                    .synthesis_failures
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                None
            }
        };

        let has_audio = audio.is_some();
        session.push_assistant(reply.clone(), audio);
        self.metrics
            .record_turn_completed(started.elapsed().as_millis() as u64);

        Ok(TurnOutcome::Reply {
            text: reply,
            has_audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lingovox_services::{DialogueTurn, SynthesisError, TurnRole};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeStt {
        text: String,
        fail: bool,
    }

    #[async_trait]
    impl SpeechToText for FakeStt {
        async fn transcribe(
            &self,
            _audio: &AudioArtifact,
            _language: &str,
        ) -> Result<String, TranscriptionError> {
            if self.fail {
                return Err(TranscriptionError::Api {
                    status: 500,
                    body: "kaputt".into(),
                });
            }
            Ok(self.text.clone())
        }
    }

    #[derive(Default)]
    struct FakeGenerator {
        reply: String,
        fail: bool,
        calls: AtomicUsize,
        seen: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl DialogueGenerator for FakeGenerator {
        async fn reply(
            &self,
            transcript: &[DialogueTurn],
            context: &str,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .push((transcript.len(), context.to_string()));
            if self.fail {
                return Err(GenerationError::EmptyReply);
            }
            Ok(self.reply.clone())
        }
    }

    struct FakeSynthesizer {
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesis for FakeSynthesizer {
        async fn synthesize(&self, _text: &str) -> Result<AudioArtifact, SynthesisError> {
            if self.fail {
                return Err(SynthesisError::EmptyAudio);
            }
            Ok(AudioArtifact::mpeg(vec![3; 64]))
        }
    }

    fn pipeline(
        stt_text: &str,
        stt_fail: bool,
        generator: Arc<FakeGenerator>,
        tts_fail: bool,
    ) -> TurnPipeline {
        TurnPipeline::new(
            Arc::new(FakeStt {
                text: stt_text.to_string(),
                fail: stt_fail,
            }),
            generator,
            Arc::new(FakeSynthesizer { fail: tts_fail }),
            "de",
            Arc::new(PipelineMetrics::default()),
        )
    }

    fn utterance() -> AudioArtifact {
        AudioArtifact::wav(vec![0; 4_000])
    }

    #[tokio::test]
    async fn successful_turn_appends_both_sides() {
        let generator = Arc::new(FakeGenerator {
            reply: "Gern, für wie viele Personen?".to_string(),
            ..Default::default()
        });
        let pipeline = pipeline(
            "Ich möchte einen Tisch reservieren",
            false,
            generator.clone(),
            false,
        );
        let mut session = DialogSession::new("Rollenspiel: Tisch reservieren");

        let outcome = pipeline.run(utterance(), &mut session).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                text: "Gern, für wie viele Personen?".to_string(),
                has_audio: true,
            }
        );
        assert_eq!(session.len(), 2);
        assert_eq!(session.transcript()[0].role, TurnRole::User);
        assert_eq!(session.transcript()[1].role, TurnRole::Assistant);
        assert!(session.transcript()[1].audio.is_some());
        // the generator saw the user turn and the persona context
        assert_eq!(
            generator.seen.lock().as_slice(),
            &[(1, "Rollenspiel: Tisch reservieren".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_transcription_short_circuits() {
        let generator = Arc::new(FakeGenerator::default());
        let pipeline = pipeline("   \n", false, generator.clone(), false);
        let mut session = DialogSession::new("");

        let outcome = pipeline.run(utterance(), &mut session).await.unwrap();

        assert_eq!(outcome, TurnOutcome::NothingSaid);
        assert!(session.is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn synthesis_failure_degrades_to_text_only() {
        let generator = Arc::new(FakeGenerator {
            reply: "Natürlich!".to_string(),
            ..Default::default()
        });
        let pipeline = pipeline("Hallo", false, generator, true);
        let mut session = DialogSession::new("");

        let outcome = pipeline.run(utterance(), &mut session).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Reply {
                text: "Natürlich!".to_string(),
                has_audio: false,
            }
        );
        // the reply text is still committed, just without audio
        assert_eq!(session.len(), 2);
        assert!(session.transcript()[1].audio.is_none());
    }

    #[tokio::test]
    async fn generation_failure_commits_only_the_user_turn() {
        let generator = Arc::new(FakeGenerator {
            fail: true,
            ..Default::default()
        });
        let pipeline = pipeline("Hallo", false, generator, false);
        let mut session = DialogSession::new("");

        let result = pipeline.run(utterance(), &mut session).await;

        assert!(matches!(result, Err(PipelineError::Generation(_))));
        assert_eq!(session.len(), 1);
        assert_eq!(session.transcript()[0].role, TurnRole::User);
    }

    #[tokio::test]
    async fn transcription_failure_commits_nothing() {
        let generator = Arc::new(FakeGenerator::default());
        let pipeline = pipeline("", true, generator.clone(), false);
        let mut session = DialogSession::new("");

        let result = pipeline.run(utterance(), &mut session).await;

        assert!(matches!(result, Err(PipelineError::Transcription(_))));
        assert!(session.is_empty());
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }
}
