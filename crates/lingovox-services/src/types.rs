use lingovox_audio::AudioArtifact;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
        }
    }
}

/// One entry of the ordered transcript. Appended, never mutated. Reply audio
/// rides on the assistant turn only until playback takes it; transcripts
/// keep text.
#[derive(Debug, Clone)]
pub struct DialogueTurn {
    pub id: Uuid,
    pub role: TurnRole,
    pub text: String,
    pub audio: Option<AudioArtifact>,
}

impl DialogueTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: TurnRole::User,
            text: text.into(),
            audio: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role: TurnRole::Assistant,
            text: text.into(),
            audio: None,
        }
    }

    pub fn with_audio(mut self, artifact: AudioArtifact) -> Self {
        self.audio = Some(artifact);
        self
    }
}
