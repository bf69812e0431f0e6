//! Parsed command blocks.

use serde::{Deserialize, Serialize};

/// One recognized command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// `{thinking: body}`: private reasoning.
    Thinking {
        /// Trimmed body.
        body: String,
    },
    /// `{<agent>-says: body}`: an utterance for the user.
    Says {
        /// Trimmed body.
        body: String,
    },
    /// `{self-prompt-from-<agent>: body}`: carried into the next turn.
    SelfPrompt {
        /// Trimmed body.
        body: String,
    },
    /// `{read-file-<name>}`.
    ReadFile {
        /// Target file.
        name: String,
    },
    /// `{push-update-<name>: body}`.
    PushUpdate {
        /// Target file.
        name: String,
        /// Trimmed body.
        body: String,
    },
    /// `{<name>-entry-<N>-delete}`.
    DeleteEntry {
        /// Target file.
        name: String,
        /// Entry number.
        entry: u64,
    },
    /// `{create-file-<name>}`.
    CreateFile {
        /// Target file.
        name: String,
    },
    /// `{delete-file-<name>}`.
    DeleteFile {
        /// Target file.
        name: String,
    },
    /// `{ping-user}`.
    PingUser,
}

impl Command {
    /// Whether executing this command touches the sandbox or the user.
    ///
    /// Thinking, utterances, and self-prompts are harvested by the engine
    /// and have no interpreter side effect.
    pub fn has_side_effect(&self) -> bool {
        !matches!(
            self,
            Self::Thinking { .. } | Self::Says { .. } | Self::SelfPrompt { .. }
        )
    }
}

/// A command together with its exact source text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// The parsed command.
    pub command: Command,
    /// The block as it appeared in the response, braces included.
    pub raw: String,
}
