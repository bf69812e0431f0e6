//! Inbound control messages.
//!
//! Front ends send `{type, payload}` JSON objects. Each message is decoded
//! into a [`ControlMessage`] and translated into a list of [`Mutation`]s,
//! which the engine applies in order between loop iterations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use wisp_core::{TierKind, UserStatus};
use wisp_settings::{PromptTemplates, WispSettings, deep_merge};

use crate::errors::ControlError;

/// A message from the front end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ControlMessage {
    /// The user said something.
    UserMessage(String),
    /// Replace and validate the service key.
    UpdateApiKey(String),
    /// Toggle self-prompting on idle.
    UpdateAutoTurnState(bool),
    /// Toggle speech playback.
    UpdateTtsState(bool),
    /// Select a speech voice.
    UpdateTtsVoice(Option<String>),
    /// The user's presence changed.
    UpdateUserStatus(UserStatus),
    /// The user started or stopped typing.
    UserTypingStatus(bool),
    /// Wipe memory, files, and session state.
    HardReset,
    /// Merge a partial settings object and save.
    SaveAllSettings(Map<String, Value>),
    /// Ask for the editable prompts.
    GetAllPrompts,
    /// Ask for the summarizer prompts.
    GetSummarizerPrompts,
    /// Replace the base system prompt.
    SaveMainPrompt {
        /// New prompt; absent keeps the current one.
        #[serde(default)]
        system_prompt: Option<String>,
    },
    /// Replace the injector and/or the template set.
    SaveSystemPrompts {
        /// New injector text.
        #[serde(default)]
        input_injector: Option<String>,
        /// New template set, replacing the old one wholesale.
        #[serde(default)]
        prompt_templates: Option<BTreeMap<String, String>>,
    },
    /// Replace some summarizer prompts.
    SaveSummarizerPrompts {
        /// New STM summarizer.
        #[serde(default)]
        stm: Option<String>,
        /// New MTM summarizer.
        #[serde(default)]
        mtm: Option<String>,
        /// New LTM summarizer.
        #[serde(default)]
        ltm: Option<String>,
    },
    /// Zero the token counters.
    ResetPersistentStats,
    /// Zero the request counter.
    ResetApiRequests,
}

/// One state change the engine applies.
#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    /// Queue a user message for the next turn.
    QueueUserMessage(String),
    /// Store a new key and reconfigure the service with it.
    ReplaceApiKey(String),
    /// Set the auto-turn toggle and restart the idle timer.
    SetAutoTurn(bool),
    /// Set the speech toggle.
    SetSpeech(bool),
    /// Set the speech voice.
    SetVoice(Option<String>),
    /// Set the user's presence.
    SetUserStatus(UserStatus),
    /// Set the typing flag; starting to type restarts the idle timer.
    SetTyping(bool),
    /// Wipe everything back to a first start.
    HardReset,
    /// Adopt a validated settings object.
    ApplySettings(Box<WispSettings>),
    /// Reply with `all_prompts_data`.
    SendAllPrompts,
    /// Reply with `summarizer_prompts_data`.
    SendSummarizerPrompts,
    /// Replace and persist the base system prompt.
    SetSystemPrompt(String),
    /// Replace and persist the injector.
    SetInputInjector(String),
    /// Replace the template set.
    SetPromptTemplates(PromptTemplates),
    /// Replace and persist one summarizer prompt.
    SetSummarizerPrompt(TierKind, String),
    /// Zero the token counters.
    ResetTokenStats,
    /// Zero the request counter.
    ResetRequestCount,
    /// Write `config.json`.
    SaveConfig,
    /// Emit an informational status line.
    Notify(String),
}

impl Mutation {
    /// One-line description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::QueueUserMessage(text) => format!("queue user message ({} chars)", text.len()),
            Self::ReplaceApiKey(key) if key.is_empty() => "clear api key".to_string(),
            Self::ReplaceApiKey(_) => "replace api key".to_string(),
            Self::SetAutoTurn(on) => format!("auto-turn {}", on_off(*on)),
            Self::SetSpeech(on) => format!("speech {}", on_off(*on)),
            Self::SetVoice(voice) => format!("voice {}", voice.as_deref().unwrap_or("default")),
            Self::SetUserStatus(status) => format!("user status {status}"),
            Self::SetTyping(typing) => format!("typing {}", on_off(*typing)),
            Self::HardReset => "hard reset".to_string(),
            Self::ApplySettings(_) => "apply settings".to_string(),
            Self::SendAllPrompts => "send all prompts".to_string(),
            Self::SendSummarizerPrompts => "send summarizer prompts".to_string(),
            Self::SetSystemPrompt(text) => format!("system prompt ({} chars)", text.len()),
            Self::SetInputInjector(text) => format!("input injector ({} chars)", text.len()),
            Self::SetPromptTemplates(t) => format!("prompt templates ({} keys)", t.as_map().len()),
            Self::SetSummarizerPrompt(tier, text) => {
                format!("{tier} summarizer ({} chars)", text.len())
            }
            Self::ResetTokenStats => "reset token stats".to_string(),
            Self::ResetRequestCount => "reset request count".to_string(),
            Self::SaveConfig => "save config".to_string(),
            Self::Notify(text) => format!("notify: {text}"),
        }
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

impl ControlMessage {
    /// Decode a `{type, payload}` JSON object.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Mutations carrying out this message against `current` settings.
    pub fn into_mutations(self, current: &WispSettings) -> Result<Vec<Mutation>, ControlError> {
        let mutations = match self {
            Self::UserMessage(text) => vec![Mutation::QueueUserMessage(text)],
            Self::UpdateApiKey(key) => vec![Mutation::ReplaceApiKey(key), Mutation::SaveConfig],
            Self::UpdateAutoTurnState(on) => vec![Mutation::SetAutoTurn(on)],
            Self::UpdateTtsState(on) => vec![Mutation::SetSpeech(on)],
            Self::UpdateTtsVoice(voice) => vec![Mutation::SetVoice(voice)],
            Self::UpdateUserStatus(status) => vec![Mutation::SetUserStatus(status)],
            Self::UserTypingStatus(typing) => vec![Mutation::SetTyping(typing)],
            Self::HardReset => vec![Mutation::HardReset],
            Self::SaveAllSettings(patch) => vec![
                Mutation::ApplySettings(Box::new(merge_settings(current, patch)?)),
                Mutation::SaveConfig,
                Mutation::Notify("Settings saved.".to_string()),
            ],
            Self::GetAllPrompts => vec![Mutation::SendAllPrompts],
            Self::GetSummarizerPrompts => vec![Mutation::SendSummarizerPrompts],
            Self::SaveMainPrompt { system_prompt } => {
                let mut out: Vec<Mutation> =
                    system_prompt.into_iter().map(Mutation::SetSystemPrompt).collect();
                out.push(Mutation::Notify("Main prompt saved.".to_string()));
                out
            }
            Self::SaveSystemPrompts {
                input_injector,
                prompt_templates,
            } => {
                let mut out = Vec::new();
                if let Some(text) = input_injector {
                    out.push(Mutation::SetInputInjector(text));
                }
                if let Some(map) = prompt_templates {
                    out.push(Mutation::SetPromptTemplates(PromptTemplates::from_map(map)));
                    out.push(Mutation::SaveConfig);
                }
                out.push(Mutation::Notify("System & template prompts saved.".to_string()));
                out
            }
            Self::SaveSummarizerPrompts { stm, mtm, ltm } => {
                let mut out: Vec<Mutation> = [(TierKind::Stm, stm), (TierKind::Mtm, mtm), (TierKind::Ltm, ltm)]
                    .into_iter()
                    .filter_map(|(tier, text)| text.map(|t| Mutation::SetSummarizerPrompt(tier, t)))
                    .collect();
                out.push(Mutation::Notify("Summarizer prompts saved.".to_string()));
                out
            }
            Self::ResetPersistentStats => vec![
                Mutation::ResetTokenStats,
                Mutation::Notify("Persistent token stats reset.".to_string()),
            ],
            Self::ResetApiRequests => vec![
                Mutation::ResetRequestCount,
                Mutation::Notify("API request counter reset.".to_string()),
            ],
        };
        Ok(mutations)
    }
}

/// Deep-merge `patch` over `current` and validate the result.
fn merge_settings(current: &WispSettings, patch: Map<String, Value>) -> Result<WispSettings, ControlError> {
    let invalid = |e: &dyn fmt::Display| ControlError::InvalidSettings(e.to_string());
    let base = serde_json::to_value(current).map_err(|e| invalid(&e))?;
    let merged = deep_merge(base, Value::Object(patch));
    let settings: WispSettings = serde_json::from_value(merged).map_err(|e| invalid(&e))?;
    settings.validate().map_err(|e| invalid(&e))?;
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
