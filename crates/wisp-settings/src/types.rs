//! Settings type definitions.
//!
//! Field names are `snake_case` and match `config.json` on disk. Every type
//! carries `#[serde(default)]`, so partial files deserialize with defaults
//! for the missing fields. Keys this version does not know about are kept in
//! [`WispSettings::extra`] and written back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wisp_core::{ChatLogEntry, TierKind, UsageStats, UserStatus};

use crate::errors::{Result, SettingsError};
use crate::templates::PromptTemplates;

/// Default generation model.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";

/// Sampling parameters passed to the generation service.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmParams {
    /// Sampling temperature.
    pub temperature: f64,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f64,
}

impl Default for LlmParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 30,
            top_p: 0.9,
        }
    }
}

/// Per-tier entry caps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryCapacities {
    /// Short-term cap.
    pub stm: usize,
    /// Medium-term cap.
    pub mtm: usize,
    /// Long-term cap.
    pub ltm: usize,
}

impl Default for MemoryCapacities {
    fn default() -> Self {
        Self {
            stm: 6,
            mtm: 6,
            ltm: 6,
        }
    }
}

impl MemoryCapacities {
    /// Cap for one tier.
    pub fn get(&self, tier: TierKind) -> usize {
        match tier {
            TierKind::Stm => self.stm,
            TierKind::Mtm => self.mtm,
            TierKind::Ltm => self.ltm,
        }
    }
}

/// Headers printed above each memory tier in the system section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryPromptHeaders {
    /// Short-term header.
    pub stm: String,
    /// Medium-term header.
    pub mtm: String,
    /// Long-term header.
    pub ltm: String,
}

impl Default for MemoryPromptHeaders {
    fn default() -> Self {
        Self {
            stm: "#wispers-short-term-memories :".to_string(),
            mtm: "#wispers-median-term-memories :".to_string(),
            ltm: "#wispers-long-term-memories :".to_string(),
        }
    }
}

impl MemoryPromptHeaders {
    /// Header for one tier. An empty header falls back to a name-based one.
    pub fn get(&self, tier: TierKind) -> String {
        let header = match tier {
            TierKind::Stm => &self.stm,
            TierKind::Mtm => &self.mtm,
            TierKind::Ltm => &self.ltm,
        };
        if header.is_empty() {
            format!("#{{NAME}}-s-{tier}-term-memories :")
        } else {
            header.clone()
        }
    }
}

/// Root settings type, persisted as `config.json`.
///
/// Besides configuration it carries the session snapshot (`has_history`,
/// `last_self_prompt`, `chat_history`) and the cumulative usage counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WispSettings {
    /// Generation service API key.
    pub api_key: String,
    /// Generation model name.
    pub model: String,
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Sampling parameters.
    pub llm_params: LlmParams,
    /// Agent display name; also part of the command grammar.
    pub agent_name: String,
    /// User display name.
    pub user_name: String,
    /// Whether the agent self-prompts when idle.
    pub auto_turn_enabled: bool,
    /// Idle seconds before a self-prompt turn.
    pub auto_turn_duration: u64,
    /// Current user presence.
    pub user_status: UserStatus,
    /// Chat log ring buffer capacity.
    pub chat_log_length: usize,
    /// Whether utterances are voiced.
    pub tts_enabled: bool,
    /// Voice identifier for the speech sink.
    pub tts_voice_id: Option<String>,
    /// Character cap for entry-based (`.txt`) files.
    pub max_file_char_count: usize,
    /// Maximum number of files in the sandbox.
    pub max_terminal_files: usize,
    /// Extensions the agent may create, with leading dot.
    pub allowed_file_extensions: Vec<String>,
    /// Per-tier memory caps.
    pub memory_capacities: MemoryCapacities,
    /// Per-tier memory headers.
    pub memory_prompt_headers: MemoryPromptHeaders,
    /// Prompt and feedback templates.
    pub prompt_templates: PromptTemplates,
    /// Cumulative usage counters.
    pub persistent_usage_stats: UsageStats,
    /// Whether a previous session left chat history behind.
    pub has_history: bool,
    /// Self-prompts of the last turn, newline-joined.
    pub last_self_prompt: String,
    /// Chat log at the time of the last save.
    pub chat_history: Vec<ChatLogEntry>,
    /// Unrecognized keys, preserved across saves.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for WispSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            log_level: "info".to_string(),
            llm_params: LlmParams::default(),
            agent_name: "Agent".to_string(),
            user_name: "User".to_string(),
            auto_turn_enabled: false,
            auto_turn_duration: 60,
            user_status: UserStatus::Online,
            chat_log_length: 10,
            tts_enabled: false,
            tts_voice_id: None,
            max_file_char_count: 500,
            max_terminal_files: 10,
            allowed_file_extensions: vec![".txt".to_string()],
            memory_capacities: MemoryCapacities::default(),
            memory_prompt_headers: MemoryPromptHeaders::default(),
            prompt_templates: PromptTemplates::default(),
            persistent_usage_stats: UsageStats::default(),
            has_history: false,
            last_self_prompt: String::new(),
            chat_history: Vec::new(),
            extra: Map::new(),
        }
    }
}

impl WispSettings {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent_name.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "agent_name must not be empty".to_string(),
            ));
        }
        if self.chat_log_length == 0 {
            return Err(SettingsError::InvalidValue(
                "chat_log_length must be at least 1".to_string(),
            ));
        }
        for tier in TierKind::ALL {
            if self.memory_capacities.get(tier) == 0 {
                return Err(SettingsError::InvalidValue(format!(
                    "memory_capacities.{tier} must be at least 1"
                )));
            }
        }
        if let Some(ext) = self
            .allowed_file_extensions
            .iter()
            .find(|ext| !ext.starts_with('.') || ext.len() < 2)
        {
            return Err(SettingsError::InvalidValue(format!(
                "allowed file extension {ext:?} must start with '.'"
            )));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
