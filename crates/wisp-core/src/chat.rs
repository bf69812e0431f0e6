//! Chat log lines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One line of conversation: who spoke and what they said.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    /// Display name of the speaker (agent or user name at the time).
    pub speaker: String,
    /// Spoken text.
    pub text: String,
}

impl ChatLogEntry {
    /// Build an entry.
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
        }
    }
}

/// Renders as `speaker: text`, the form used inside prompts.
impl fmt::Display for ChatLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.speaker, self.text)
    }
}
