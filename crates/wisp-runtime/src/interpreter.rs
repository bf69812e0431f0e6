//! Command interpreter.
//!
//! Executes the side-effect commands of a validated response against the
//! sandbox. Every outcome is rendered through a feedback template and queued
//! for the next prompt; terminal errors never leave this module.

use tracing::{debug, warn};
use wisp_core::{EngineEvent, EventEmitter};
use wisp_protocol::Command;
use wisp_settings::{PromptTemplates, keys};
use wisp_terminal::{PushOutcome, TerminalError, VirtualTerminal};

use crate::turn_state::TurnState;

/// Runs commands for one turn.
pub struct CommandInterpreter<'a> {
    terminal: &'a mut VirtualTerminal,
    templates: &'a PromptTemplates,
    events: &'a EventEmitter,
}

impl<'a> CommandInterpreter<'a> {
    /// Interpreter over `terminal`, rendering with `templates`.
    pub fn new(
        terminal: &'a mut VirtualTerminal,
        templates: &'a PromptTemplates,
        events: &'a EventEmitter,
    ) -> Self {
        Self {
            terminal,
            templates,
            events,
        }
    }

    /// Execute `commands` in order, queueing feedback on `turn`.
    pub fn run<'c>(&mut self, commands: impl IntoIterator<Item = &'c Command>, turn: &mut TurnState) {
        for command in commands {
            if let Some(feedback) = self.execute(command, turn) {
                turn.push_feedback(&feedback);
            }
        }
    }

    /// Execute one command. Returns the feedback, if any.
    pub fn execute(&mut self, command: &Command, turn: &mut TurnState) -> Option<String> {
        debug!(?command, "executing command");
        match command {
            Command::ReadFile { name } => {
                turn.pending_read = Some(name.clone());
                None
            }
            Command::PushUpdate { name, body } => self.push(name, body),
            Command::DeleteEntry { name, entry } => self.delete_entry(name, *entry),
            Command::CreateFile { name } => self.create(name),
            Command::DeleteFile { name } => self.delete(name),
            Command::PingUser => {
                self.events.emit(EngineEvent::PingUser);
                None
            }
            Command::Thinking { .. } | Command::Says { .. } | Command::SelfPrompt { .. } => None,
        }
    }

    /// Feedback for a deferred `read-file` request.
    pub fn resolve_read(&self, name: &str) -> Option<String> {
        let file = [("__FILENAME__", name)];
        match self.terminal.read(name) {
            Ok(content) => Some(self.templates.render(
                keys::FILE_READ_SUCCESS,
                &[("__FILENAME__", name), ("__CONTENT__", &content)],
            )),
            Err(TerminalError::NotFound { .. }) => {
                Some(self.templates.render(keys::FILE_READ_NOT_FOUND_ERROR, &file))
            }
            Err(e) => self.on_error(e, keys::FILE_READ_ERROR, &file),
        }
    }

    fn push(&mut self, name: &str, body: &str) -> Option<String> {
        let file = [("__FILENAME__", name)];
        match self.terminal.push(name, body) {
            Ok(PushOutcome::Appended { entry }) => Some(self.templates.render(
                keys::FILE_PUSH_SUCCESS,
                &[("__FILENAME__", name), ("__ENTRY_NUMBER__", &entry.to_string())],
            )),
            Ok(PushOutcome::Overwritten) => {
                Some(self.templates.render(keys::FILE_PUSH_OVERWRITE_SUCCESS, &file))
            }
            Err(TerminalError::NotFound { .. }) => {
                Some(self.templates.render(keys::FILE_PUSH_NOT_FOUND_ERROR, &file))
            }
            Err(TerminalError::Capacity { content, .. }) => Some(self.templates.render(
                keys::FILE_PUSH_CAPACITY_ERROR,
                &[("__FILENAME__", name), ("__CURRENT_CONTENT__", &content)],
            )),
            Err(e) => self.on_error(e, keys::FILE_READ_ERROR, &file),
        }
    }

    fn delete_entry(&mut self, name: &str, entry: u64) -> Option<String> {
        let number = entry.to_string();
        let subs = [("__ENTRY_NUMBER__", number.as_str()), ("__FILENAME__", name)];
        match self.terminal.delete_entry(name, entry) {
            Ok(()) => Some(self.templates.render(keys::FILE_DELETE_ENTRY_SUCCESS, &subs)),
            Err(
                TerminalError::NotFound { .. }
                | TerminalError::EntryNotFound { .. }
                | TerminalError::InvalidName { .. },
            ) => Some(self.templates.render(keys::FILE_DELETE_ENTRY_NOT_FOUND, &subs)),
            Err(e) => self.on_error(e, keys::FILE_DELETE_ENTRY_ERROR, &[("__FILENAME__", name)]),
        }
    }

    fn create(&mut self, name: &str) -> Option<String> {
        let file = [("__FILENAME__", name)];
        match self.terminal.create(name) {
            Ok(()) => Some(self.templates.render(keys::FILE_CREATE_SUCCESS, &file)),
            Err(TerminalError::InvalidExtension { allowed, .. }) => Some(self.templates.render(
                keys::FILE_CREATE_INVALID_EXTENSION_ERROR,
                &[("__FILENAME__", name), ("__ALLOWED_EXTENSIONS__", &allowed.join(", "))],
            )),
            Err(TerminalError::FileLimit { limit, files, .. }) => Some(self.templates.render(
                keys::FILE_CREATE_CAPACITY_ERROR,
                &[
                    ("__FILENAME__", name),
                    ("__LIMIT__", &limit.to_string()),
                    ("__FILE_LIST__", &files.join(", ")),
                ],
            )),
            Err(TerminalError::AlreadyExists { .. }) => {
                Some(self.templates.render(keys::FILE_CREATE_ALREADY_EXISTS_ERROR, &file))
            }
            Err(e) => self.on_error(e, keys::FILE_CREATE_ERROR, &file),
        }
    }

    fn delete(&mut self, name: &str) -> Option<String> {
        let file = [("__FILENAME__", name)];
        match self.terminal.delete(name) {
            Ok(()) => Some(self.templates.render(keys::FILE_DELETE_SUCCESS, &file)),
            Err(TerminalError::NotFound { .. } | TerminalError::InvalidName { .. }) => {
                Some(self.templates.render(keys::FILE_DELETE_NOT_FOUND_ERROR, &file))
            }
            Err(e) => self.on_error(e, keys::FILE_DELETE_ERROR, &file),
        }
    }

    /// Invalid names are silent; I/O failures render `io_key`.
    fn on_error(&self, error: TerminalError, io_key: &str, subs: &[(&str, &str)]) -> Option<String> {
        match error {
            TerminalError::InvalidName { name } => {
                debug!(file = %name, "ignoring command on invalid file name");
                None
            }
            TerminalError::Io { .. } => {
                warn!(error = %error, "file command failed");
                Some(self.templates.render(io_key, subs))
            }
            other => {
                warn!(error = %other, "unexpected terminal outcome");
                None
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
