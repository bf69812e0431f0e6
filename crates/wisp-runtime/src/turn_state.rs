//! Per-turn working state owned by the engine task.

use std::time::Duration;

use tokio::time::Instant;

/// Everything the engine carries from one turn to the next.
#[derive(Clone, Debug)]
pub struct TurnState {
    /// User messages waiting for the next turn, oldest first.
    pub pending_messages: Vec<String>,
    /// Self-prompt blocks carried into the next prompt.
    pub self_prompts: Vec<String>,
    /// File the model asked to read; resolved after the turn.
    pub pending_read: Option<String>,
    /// Run a turn on the next iteration regardless of other triggers.
    pub force_next_turn: bool,
    /// Interpreter feedback for the next prompt.
    pub feedback: String,
    /// Last user or engine activity, for the auto-turn timer.
    pub last_activity: Instant,
    /// Front end reports the user is typing.
    pub user_typing: bool,
    /// Emit `user_input_processed` once speech playback finishes.
    pub input_processed_after_speech: bool,
}

impl TurnState {
    /// Fresh state carrying `self_prompts`.
    pub fn new(self_prompts: Vec<String>) -> Self {
        Self {
            pending_messages: Vec::new(),
            self_prompts,
            pending_read: None,
            force_next_turn: false,
            feedback: String::new(),
            last_activity: Instant::now(),
            user_typing: false,
            input_processed_after_speech: false,
        }
    }

    /// Reset the auto-turn timer.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Append interpreter feedback; any feedback forces the next turn.
    pub fn push_feedback(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.feedback.push_str(text);
        self.force_next_turn = true;
    }

    /// Pending user messages joined by a space, if any.
    pub fn user_line(&self) -> Option<String> {
        (!self.pending_messages.is_empty()).then(|| self.pending_messages.join(" "))
    }
}
