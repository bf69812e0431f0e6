//! Response validation.
//!
//! A response is accepted only if it carries a non-empty thinking block, a
//! non-empty self-prompt, and at least one recognized block. The checks run
//! in that order and the first failure wins.

use thiserror::Error;
use tracing::debug;

use crate::command::{Block, Command};
use crate::tokenizer::{Grammar, sanitize};

/// Why a response was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing but whitespace came back.
    #[error("Response was empty.")]
    Empty,

    /// No `{thinking: ...}` block with a non-empty body.
    #[error("Required '{{thinking}}' command is missing or empty.")]
    MissingThinking,

    /// No `{self-prompt-from-<agent>: ...}` block with a non-empty body.
    #[error("Required '{{self-prompt-from-{agent}}}' is missing or empty.")]
    MissingSelfPrompt {
        /// Agent name the grammar expects.
        agent: String,
    },

    /// No block in the response was recognized.
    #[error("Could not extract any valid command blocks.")]
    NoCommandBlocks,
}

/// An accepted response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validated {
    /// Recognized blocks in order of appearance.
    pub blocks: Vec<Block>,
    /// Concatenated source text of `blocks`.
    pub sanitized: String,
}

impl Validated {
    /// Body of the first non-empty thinking block.
    pub fn thinking(&self) -> Option<&str> {
        self.blocks.iter().find_map(|b| match &b.command {
            Command::Thinking { body } if !body.is_empty() => Some(body.as_str()),
            _ => None,
        })
    }

    /// Non-empty utterance bodies, in order.
    pub fn utterances(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match &b.command {
                Command::Says { body } if !body.is_empty() => Some(body.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Self-prompt blocks as written, to be carried into the next prompt.
    pub fn self_prompts(&self) -> Vec<String> {
        self.blocks
            .iter()
            .filter(|b| matches!(b.command, Command::SelfPrompt { .. }))
            .map(|b| b.raw.clone())
            .collect()
    }

    /// Commands the interpreter must execute, in order.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.blocks
            .iter()
            .map(|b| &b.command)
            .filter(|c| c.has_side_effect())
    }
}

impl Grammar {
    /// Parse and validate a raw response.
    pub fn validate(&self, raw: &str) -> Result<Validated, ValidationError> {
        if raw.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let blocks = self.extract(raw);
        debug!(blocks = blocks.len(), "extracted command blocks");

        let has_thinking = blocks
            .iter()
            .any(|b| matches!(&b.command, Command::Thinking { body } if !body.is_empty()));
        if !has_thinking {
            return Err(ValidationError::MissingThinking);
        }

        let has_self_prompt = blocks
            .iter()
            .any(|b| matches!(&b.command, Command::SelfPrompt { body } if !body.is_empty()));
        if !has_self_prompt {
            return Err(ValidationError::MissingSelfPrompt {
                agent: self.agent_name().to_string(),
            });
        }

        // Unreachable once a thinking block exists.
        if blocks.is_empty() {
            return Err(ValidationError::NoCommandBlocks);
        }

        let sanitized = sanitize(&blocks);
        Ok(Validated { blocks, sanitized })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
