pub mod client;
pub mod error;
pub mod types;

pub use client::{OpenAiClient, ServiceConfig};
pub use error::{GenerationError, SynthesisError, TranscriptionError};
pub use types::{DialogueTurn, TurnRole};

use async_trait::async_trait;
use lingovox_audio::AudioArtifact;

/// Speech-to-text boundary: one finalized utterance plus a language tag in,
/// plain text out. An empty result is a legitimate "nothing said".
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        audio: &AudioArtifact,
        language: &str,
    ) -> Result<String, TranscriptionError>;
}

/// Dialogue-generation boundary: the ordered transcript plus a free-form
/// persona/situation context in, one assistant reply out.
#[async_trait]
pub trait DialogueGenerator: Send + Sync {
    async fn reply(
        &self,
        transcript: &[DialogueTurn],
        context: &str,
    ) -> Result<String, GenerationError>;
}

/// Speech-synthesis boundary: reply text in, one playable artifact out.
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<AudioArtifact, SynthesisError>;
}
