//! On-disk layout of the data directory.
//!
//! ```text
//! <root>/config.json
//! <root>/prompts/smol-agent-sys-prompt.txt
//! <root>/prompts/input_injector.txt
//! <root>/prompts/{stm,mtm,ltm}_summarizer.txt
//! <root>/terminal/
//! <root>/memory/{stm,mtm,ltm}.json
//! ```

use std::path::{Path, PathBuf};

use wisp_core::TierKind;

use crate::errors::Result;

/// Resolve the default data directory (`$WISP_DATA_DIR`, else `~/.wisp`).
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("WISP_DATA_DIR").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".wisp")
}

/// Paths of every file the agent reads or writes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    /// Layout rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Data directory root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `config.json`.
    pub fn config(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Prompt file directory.
    pub fn prompts_dir(&self) -> PathBuf {
        self.root.join("prompts")
    }

    /// Base system prompt file.
    pub fn system_prompt(&self) -> PathBuf {
        self.prompts_dir().join("smol-agent-sys-prompt.txt")
    }

    /// Input injector file.
    pub fn input_injector(&self) -> PathBuf {
        self.prompts_dir().join("input_injector.txt")
    }

    /// Summarizer prompt for the stage that produces `tier`.
    pub fn summarizer(&self, tier: TierKind) -> PathBuf {
        self.prompts_dir().join(format!("{tier}_summarizer.txt"))
    }

    /// Sandbox root for the virtual terminal.
    pub fn terminal_dir(&self) -> PathBuf {
        self.root.join("terminal")
    }

    /// Memory tier directory.
    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    /// Create the prompt, terminal, and memory directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.prompts_dir(), self.terminal_dir(), self.memory_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
