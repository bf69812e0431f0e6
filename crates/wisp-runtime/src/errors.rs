//! Runtime error types.

use thiserror::Error;

use crate::state::{EngineState, Transition};

/// Errors that stop the engine loop.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Settings or prompt files could not be loaded or saved.
    #[error("Settings error: {0}")]
    Settings(#[from] wisp_settings::SettingsError),

    /// The sandbox could not be opened.
    #[error("Terminal error: {0}")]
    Terminal(#[from] wisp_terminal::TerminalError),

    /// The memory store could not be opened.
    #[error("Memory error: {0}")]
    Memory(#[from] wisp_memory::MemoryError),

    /// The state machine was asked for a transition it does not have.
    #[error("Illegal transition: {transition:?} from {from:?}")]
    IllegalTransition {
        /// State at the time of the request.
        from: EngineState,
        /// Requested transition.
        transition: Transition,
    },

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Error category string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Settings(_) => "settings",
            Self::Terminal(_) => "terminal",
            Self::Memory(_) => "memory",
            Self::IllegalTransition { .. } => "state",
            Self::Internal(_) => "internal",
        }
    }
}

/// Errors turning a control message into mutations.
///
/// These are reported to the front end; the loop keeps running.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The merged settings failed to decode or validate.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A prompt file or `config.json` could not be written.
    #[error("Could not save: {0}")]
    Persist(#[from] wisp_settings::SettingsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let err = RuntimeError::IllegalTransition {
            from: EngineState::Paused,
            transition: Transition::Trigger,
        };
        assert_eq!(err.category(), "state");
        assert_eq!(err.to_string(), "Illegal transition: Trigger from Paused");
        assert_eq!(RuntimeError::Internal("x".into()).category(), "internal");
    }

    #[test]
    fn control_error_display() {
        let err = ControlError::InvalidSettings("chat_log_length must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "Invalid settings: chat_log_length must be at least 1"
        );
    }
}
