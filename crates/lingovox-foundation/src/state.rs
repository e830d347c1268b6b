use crate::error::AppError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;

/// What the conversation loop is doing right now. Exactly one value is
/// active at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    /// No device held, no pending work.
    Idle,
    /// Recording session and silence monitor active.
    Listening,
    /// Turn pipeline running; no device held.
    Processing,
    /// Reply artifact playing; no device held.
    Speaking,
}

impl fmt::Display for ConversationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConversationState::Idle => "idle",
            ConversationState::Listening => "listening",
            ConversationState::Processing => "processing",
            ConversationState::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Sole owner of the conversation state. Transitions outside the table are
/// rejected instead of silently ignored.
#[derive(Clone)]
pub struct ConversationStateMachine {
    state: Arc<RwLock<ConversationState>>,
    state_tx: Sender<ConversationState>,
    state_rx: Receiver<ConversationState>,
}

impl Default for ConversationStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(ConversationState::Idle)),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, next: ConversationState) -> Result<(), AppError> {
        use ConversationState::*;

        let mut current = self.state.write();

        let valid = matches!(
            (*current, next),
            (Idle, Listening)
                // endpoint or manual stop with a usable utterance
                | (Listening, Processing)
                // utterance discarded as empty/too short: re-arm listening
                | (Listening, Listening)
                | (Processing, Speaking)
                // reply without audio, recovered failure, or nothing said
                | (Processing, Listening)
                | (Speaking, Listening)
                // pause request from any active state
                | (Listening, Idle)
                | (Processing, Idle)
                | (Speaking, Idle)
        );

        if !valid {
            return Err(AppError::InvalidTransition(format!(
                "{} -> {}",
                *current, next
            )));
        }

        tracing::info!(target: "state", "{} -> {}", *current, next);
        *current = next;
        let _ = self.state_tx.send(next);
        Ok(())
    }

    pub fn current(&self) -> ConversationState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<ConversationState> {
        self.state_rx.clone()
    }
}
