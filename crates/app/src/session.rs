use lingovox_audio::AudioArtifact;
use lingovox_services::{DialogueTurn, TurnRole};

/// Ordered transcript plus the persona/situation context forwarded to the
/// dialogue service. Turns are appended, never mutated; all of it is
/// session-scoped and discarded when the conversation restarts.
pub struct DialogSession {
    transcript: Vec<DialogueTurn>,
    context: String,
}

impl DialogSession {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            transcript: Vec::new(),
            context: context.into(),
        }
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn transcript(&self) -> &[DialogueTurn] {
        &self.transcript
    }

    pub fn len(&self) -> usize {
        self.transcript.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.transcript.push(DialogueTurn::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>, audio: Option<AudioArtifact>) {
        let mut turn = DialogueTurn::assistant(text);
        if let Some(artifact) = audio {
            turn = turn.with_audio(artifact);
        }
        self.transcript.push(turn);
    }

    /// Take the reply audio off the newest assistant turn for playback.
    /// Afterwards the transcript keeps text only; no artifact outlives its
    /// turn.
    pub fn take_reply_audio(&mut self) -> Option<AudioArtifact> {
        self.transcript
            .last_mut()
            .filter(|turn| turn.role == TurnRole::Assistant)
            .and_then(|turn| turn.audio.take())
    }

    /// Drop the whole conversation. Used when the learner starts over.
    pub fn reset(&mut self) {
        self.transcript.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_keep_insertion_order() {
        let mut session = DialogSession::new("Rollenspiel im Restaurant");
        session.push_user("Guten Tag");
        session.push_assistant("Guten Tag! Was darf es sein?", None);
        session.push_user("Einen Kaffee, bitte");

        let roles: Vec<TurnRole> = session.transcript().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::User, TurnRole::Assistant, TurnRole::User]
        );
        assert_eq!(session.context(), "Rollenspiel im Restaurant");
    }

    #[test]
    fn take_reply_audio_leaves_the_text_in_place() {
        let mut session = DialogSession::new("");
        session.push_user("Hallo");
        session.push_assistant("Hallo!", Some(AudioArtifact::mpeg(vec![9; 32])));

        let audio = session.take_reply_audio();
        assert!(audio.is_some());
        // the turn survives, the audio does not
        assert_eq!(session.transcript().last().unwrap().text, "Hallo!");
        assert!(session.transcript().last().unwrap().audio.is_none());
        assert!(session.take_reply_audio().is_none());
    }

    #[test]
    fn take_reply_audio_ignores_user_turns() {
        let mut session = DialogSession::new("");
        session.push_user("Hallo");
        assert!(session.take_reply_audio().is_none());
    }

    #[test]
    fn reset_discards_everything() {
        let mut session = DialogSession::new("ctx");
        session.push_user("eins");
        session.push_assistant("zwei", None);
        session.reset();
        assert!(session.is_empty());
    }
}
