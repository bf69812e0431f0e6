//! Outbound engine events.
//!
//! Every observable state change leaves the engine as an [`EngineEvent`] on
//! an unbounded channel. On the wire each event is a `{type, payload}` JSON
//! object; unit events omit the payload.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::chat::ChatLogEntry;
use crate::memory::MemorySnapshot;
use crate::presence::UserStatus;
use crate::usage::{TokenUsage, UsageStats};

// ─────────────────────────────────────────────────────────────────────────────
// Payloads
// ─────────────────────────────────────────────────────────────────────────────

/// Partial status line update. Only the populated fields change.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Generation state (`"Generating..."`, `"Idle"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_status: Option<String>,
    /// Countdown text for the next self-prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_timer: Option<String>,
    /// One-off informational notice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Generation service availability message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_status: Option<String>,
    /// Full memory tiers after a consolidation pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemorySnapshot>,
}

impl StatusUpdate {
    /// Status carrying only the generation state.
    pub fn llm(status: impl Into<String>) -> Self {
        Self {
            llm_status: Some(status.into()),
            ..Self::default()
        }
    }

    /// Status carrying only the countdown text.
    pub fn timer(text: impl Into<String>) -> Self {
        Self {
            turn_timer: Some(text.into()),
            ..Self::default()
        }
    }

    /// Status carrying only an informational notice.
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            info: Some(text.into()),
            ..Self::default()
        }
    }

    /// Status carrying only the service availability message.
    pub fn api(text: impl Into<String>) -> Self {
        Self {
            api_status: Some(text.into()),
            ..Self::default()
        }
    }

    /// Status carrying only the memory tiers.
    pub fn memory(snapshot: MemorySnapshot) -> Self {
        Self {
            memory: Some(snapshot),
            ..Self::default()
        }
    }
}

/// A chat or log line for the front end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NewMessage {
    /// Something the agent said, shown in the chat pane.
    Chat {
        /// Utterance text.
        sanitized_message: String,
        /// Display tag (`agent_chat`).
        chat_tag: String,
    },
    /// Raw model output for the audit log.
    Raw {
        /// Unfiltered model text.
        raw_log: String,
        /// Token usage for the call, when reported.
        usage: Option<TokenUsage>,
        /// Log tag (`output_log`, `summarizer_output`).
        tag: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// EngineEvent
// ─────────────────────────────────────────────────────────────────────────────

/// Outbound message from the engine to its observers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Partial status line update.
    StatusUpdate(StatusUpdate),
    /// Chat line or raw log line.
    NewMessage(NewMessage),
    /// Dynamic slice of the prompt sent this turn.
    LogInput {
        /// Prompt slice.
        log_content: String,
        /// Log tag (`input_log`).
        tag: String,
    },
    /// Full prompt text for a generation call.
    UpdateFullContext {
        /// Complete prompt.
        full_context: String,
        /// Present for summarizer prompts.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<String>,
    },
    /// User-facing error.
    Error(String),
    /// The agent asked for the user's attention.
    PingUser,
    /// Speech playback began; the engine is paused.
    TtsPlaybackStarted,
    /// Speech playback ended.
    TtsPlaybackFinished,
    /// Current cumulative usage counters.
    UpdatePersistentStats(UsageStats),
    /// The user's pending input has been handled.
    UserInputProcessed,
    /// Every attempt of a turn failed validation or generation.
    LogGenerationFailure {
        /// Failure report.
        log_content: String,
    },
    /// Whether the generation service accepted the configured key.
    ApiKeyValidationStatus(bool),
    /// The engine changed the user's status.
    SetUserStatus(UserStatus),
    /// The engine changed the auto-turn toggle.
    SetAutoTurnState(bool),
    /// Front end should drop all displayed logs.
    ClearAllUiLogs,
    /// Chat history restored from the previous session.
    LoadChatHistory(Vec<ChatLogEntry>),
    /// Base system prompt loaded at startup.
    SystemPromptLoaded(String),
    /// All editable prompts, in reply to `get_all_prompts`.
    AllPromptsData {
        /// Base system prompt.
        system_prompt: String,
        /// Input injector text.
        input_injector: String,
        /// Current templates.
        prompt_templates: BTreeMap<String, String>,
    },
    /// Summarizer prompts, in reply to `get_summarizer_prompts`.
    SummarizerPromptsData {
        /// STM summarizer prompt.
        stm: String,
        /// MTM summarizer prompt.
        mtm: String,
        /// LTM summarizer prompt.
        ltm: String,
    },
}

impl EngineEvent {
    /// Wire name of the event (`type` field).
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StatusUpdate(_) => "status_update",
            Self::NewMessage(_) => "new_message",
            Self::LogInput { .. } => "log_input",
            Self::UpdateFullContext { .. } => "update_full_context",
            Self::Error(_) => "error",
            Self::PingUser => "ping_user",
            Self::TtsPlaybackStarted => "tts_playback_started",
            Self::TtsPlaybackFinished => "tts_playback_finished",
            Self::UpdatePersistentStats(_) => "update_persistent_stats",
            Self::UserInputProcessed => "user_input_processed",
            Self::LogGenerationFailure { .. } => "log_generation_failure",
            Self::ApiKeyValidationStatus(_) => "api_key_validation_status",
            Self::SetUserStatus(_) => "set_user_status",
            Self::SetAutoTurnState(_) => "set_auto_turn_state",
            Self::ClearAllUiLogs => "clear_all_ui_logs",
            Self::LoadChatHistory(_) => "load_chat_history",
            Self::SystemPromptLoaded(_) => "system_prompt_loaded",
            Self::AllPromptsData { .. } => "all_prompts_data",
            Self::SummarizerPromptsData { .. } => "summarizer_prompts_data",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// EventEmitter
// ─────────────────────────────────────────────────────────────────────────────

/// Sending half of the outbound event channel.
///
/// Sends never block. A dropped receiver is not an error for the engine;
/// events are discarded once nobody listens.
#[derive(Clone, Debug)]
pub struct EventEmitter {
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl EventEmitter {
    /// Create an emitter together with its receiving half.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EngineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Send one event.
    pub fn emit(&self, event: EngineEvent) {
        tracing::trace!(event_type = event.event_type(), "emit");
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped");
        }
    }

    /// Shorthand for a status update.
    pub fn status(&self, update: StatusUpdate) {
        self.emit(EngineEvent::StatusUpdate(update));
    }

    /// Shorthand for a user-facing error.
    pub fn error(&self, message: impl Into<String>) {
        self.emit(EngineEvent::Error(message.into()));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
