//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when loading or saving settings and prompt files.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write a settings or prompt file.
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse or encode settings JSON.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was invalid (e.g., zero capacity).
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
    /// The base system prompt file does not exist.
    #[error("system prompt file not found: {}", .0.display())]
    MissingSystemPrompt(PathBuf),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
