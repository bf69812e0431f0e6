//! Line-oriented front end.
//!
//! Input lines become user messages unless they start with `/`, in which
//! case they are control shortcuts. Engine events are rendered to single
//! display lines; audit-only events render to nothing.

use async_trait::async_trait;
use wisp_core::{EngineEvent, NewMessage, StatusUpdate, UserStatus};
use wisp_runtime::{ControlMessage, SpeechError, SpeechSink};

/// What one input line asks for.
#[derive(Debug, PartialEq)]
pub enum ConsoleInput {
    /// Forward to the engine.
    Control(ControlMessage),
    /// Leave the console.
    Quit,
    /// Blank line.
    Nothing,
}

/// Interpret one line typed by the user.
pub fn parse_line(line: &str) -> Result<ConsoleInput, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleInput::Nothing);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ConsoleInput::Control(ControlMessage::UserMessage(
            line.to_string(),
        )));
    };

    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    let message = match name {
        "quit" | "exit" => return Ok(ConsoleInput::Quit),
        "reset" => ControlMessage::HardReset,
        "auto" => match arg {
            "on" => ControlMessage::UpdateAutoTurnState(true),
            "off" => ControlMessage::UpdateAutoTurnState(false),
            _ => return Err("usage: /auto on|off".to_string()),
        },
        "status" => {
            let status: UserStatus = arg.parse().map_err(|e| format!("{e}"))?;
            ControlMessage::UpdateUserStatus(status)
        }
        _ => return Err(format!("unknown command: /{name}")),
    };
    Ok(ConsoleInput::Control(message))
}

/// Display line for `event`, if it is meant for the user.
pub fn render(event: &EngineEvent, agent_name: &str) -> Option<String> {
    match event {
        EngineEvent::NewMessage(NewMessage::Chat {
            sanitized_message, ..
        }) => Some(format!("{agent_name}: {sanitized_message}")),
        EngineEvent::StatusUpdate(StatusUpdate {
            info: Some(info), ..
        }) => Some(format!("* {info}")),
        EngineEvent::Error(message) => Some(format!("! {message}")),
        EngineEvent::LogGenerationFailure { log_content } => Some(format!("! {log_content}")),
        EngineEvent::PingUser => Some(format!("* {agent_name} wants your attention")),
        EngineEvent::ApiKeyValidationStatus(false) => {
            Some("! generation service unavailable, check the API key".to_string())
        }
        EngineEvent::SetUserStatus(status) => Some(format!("* status is now {status}")),
        EngineEvent::SetAutoTurnState(on) => {
            Some(format!("* auto-turn {}", if *on { "on" } else { "off" }))
        }
        EngineEvent::LoadChatHistory(entries) if !entries.is_empty() => Some(
            entries
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        _ => None,
    }
}

/// Speech sink that prints instead of synthesizing audio.
pub struct ConsoleSpeech;

#[async_trait]
impl SpeechSink for ConsoleSpeech {
    async fn speak(&self, text: &str, voice: Option<&str>) -> Result<(), SpeechError> {
        println!("[{}] {text}", voice.unwrap_or("voice"));
        Ok(())
    }
}
