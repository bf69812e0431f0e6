//! # wisp-settings
//!
//! Configuration management for the Wisp agent.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`WispSettings::default()`]
//! 2. **User file**: `<data dir>/config.json` (deep-merged over defaults)
//! 3. **Environment variables**: `WISP_*` overrides (highest priority)
//!
//! `config.json` also carries the session snapshot and the cumulative usage
//! counters. Prompt texts live in separate files under `prompts/`
//! (see [`PromptFiles`]); feedback and injection templates are part of the
//! settings (see [`PromptTemplates`]).

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod paths;
pub mod prompts;
pub mod templates;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings_from_path, save_settings_to_path,
    save_usage_stats,
};
pub use paths::{DataPaths, default_data_dir};
pub use prompts::{
    PromptFiles, SummarizerPrompts, TEXT_TO_SUMMARIZE, ensure_prompt_files, write_prompt_file,
};
pub use templates::{PromptTemplates, keys, substitute, substitute_names};
pub use types::{LlmParams, MemoryCapacities, MemoryPromptHeaders, WispSettings};

/// Load `config.json` from a data directory layout.
pub fn load_settings(paths: &DataPaths) -> Result<WispSettings> {
    load_settings_from_path(&paths.config())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
