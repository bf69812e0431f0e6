//! Prompt files: the base system prompt, the input injector, and the three
//! summarizer prompts.
//!
//! Missing files are seeded with defaults by [`ensure_prompt_files`]. At
//! load time only the system prompt is mandatory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wisp_core::TierKind;

use crate::errors::{Result, SettingsError};
use crate::paths::DataPaths;

/// Placeholder in summarizer prompts replaced by the text to condense.
pub const TEXT_TO_SUMMARIZE: &str = "__TEXT_TO_SUMMARIZE__";

const DEFAULT_SYSTEM_PROMPT: &str = "{#Important: ...}\n<boot>";

const DEFAULT_STM_SUMMARIZER: &str = "You are a summarization expert. Your task is to take the following text, which represents an AI's thoughts and actions for a single turn, and condense it into a single, concise, third-person memory entry. Capture the key insight or action. Output only the summarized sentence, nothing else.\n\n__TEXT_TO_SUMMARIZE__";

const DEFAULT_MTM_SUMMARIZER: &str = "You are a memory consolidation expert. You will receive a list of short-term memories. Your task is to synthesize them into a single, more abstract medium-term memory. Identify the overarching theme, goal, or progression across the entries. Output only the synthesized memory, nothing else.\n\nMemories to synthesize:\n__TEXT_TO_SUMMARIZE__";

const DEFAULT_LTM_SUMMARIZER: &str = "You are a core memory synthesizer. You will receive a list of medium or long-term memories. Your task is to distill them into a single, high-level, foundational memory that captures the most critical and enduring information about the AI's identity, purpose, or key learnings. Output only the final core memory, nothing else.\n\nMemories to synthesize:\n__TEXT_TO_SUMMARIZE__";

/// Seed text for a summarizer prompt.
pub fn default_summarizer(tier: TierKind) -> &'static str {
    match tier {
        TierKind::Stm => DEFAULT_STM_SUMMARIZER,
        TierKind::Mtm => DEFAULT_MTM_SUMMARIZER,
        TierKind::Ltm => DEFAULT_LTM_SUMMARIZER,
    }
}

/// Write default content for every prompt file that does not exist yet.
///
/// Returns the paths that were created.
pub fn ensure_prompt_files(paths: &DataPaths) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(paths.prompts_dir())?;

    let mut seeds = vec![
        (paths.system_prompt(), DEFAULT_SYSTEM_PROMPT),
        (paths.input_injector(), ""),
    ];
    for tier in TierKind::ALL {
        seeds.push((paths.summarizer(tier), default_summarizer(tier)));
    }

    let mut created = Vec::new();
    for (path, content) in seeds {
        if !path.exists() {
            warn!(path = %path.display(), "prompt file missing, seeding default");
            std::fs::write(&path, content)?;
            created.push(path);
        }
    }
    Ok(created)
}

/// Summarizer prompts, one per consolidation stage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummarizerPrompts {
    /// Turn → STM entry.
    pub stm: String,
    /// STM batch → MTM entry.
    pub mtm: String,
    /// MTM batch (or LTM compaction) → LTM entry.
    pub ltm: String,
}

impl SummarizerPrompts {
    /// Read all three files; any missing file is an error.
    pub fn load(paths: &DataPaths) -> Result<Self> {
        Ok(Self {
            stm: std::fs::read_to_string(paths.summarizer(TierKind::Stm))?,
            mtm: std::fs::read_to_string(paths.summarizer(TierKind::Mtm))?,
            ltm: std::fs::read_to_string(paths.summarizer(TierKind::Ltm))?,
        })
    }

    /// Prompt for the stage producing `tier`.
    pub fn get(&self, tier: TierKind) -> &str {
        match tier {
            TierKind::Stm => &self.stm,
            TierKind::Mtm => &self.mtm,
            TierKind::Ltm => &self.ltm,
        }
    }

    /// Replace the prompt for one stage.
    pub fn set(&mut self, tier: TierKind, text: String) {
        match tier {
            TierKind::Stm => self.stm = text,
            TierKind::Mtm => self.mtm = text,
            TierKind::Ltm => self.ltm = text,
        }
    }
}

/// All prompt texts held in memory by the engine.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PromptFiles {
    /// Base system prompt.
    pub system_prompt: String,
    /// Text inserted into every dynamic section; empty when unset.
    pub input_injector: String,
    /// Summarizer prompts.
    pub summarizers: SummarizerPrompts,
}

impl PromptFiles {
    /// Load every prompt file.
    ///
    /// A missing system prompt is fatal. A missing injector reads as empty,
    /// and a missing summarizer reads as empty (its stage then produces no
    /// summary).
    pub fn load(paths: &DataPaths) -> Result<Self> {
        let system_path = paths.system_prompt();
        let system_prompt = match std::fs::read_to_string(&system_path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SettingsError::MissingSystemPrompt(system_path));
            }
            Err(e) => return Err(e.into()),
        };

        let input_injector = read_optional(&paths.input_injector())?;
        let mut summarizers = SummarizerPrompts::default();
        for tier in TierKind::ALL {
            summarizers.set(tier, read_optional(&paths.summarizer(tier))?);
        }

        info!(
            system_chars = system_prompt.len(),
            injector_chars = input_injector.len(),
            "prompt files loaded"
        );
        Ok(Self {
            system_prompt,
            input_injector,
            summarizers,
        })
    }
}

fn read_optional(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "prompt file missing, using empty text");
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Overwrite one prompt file, creating the prompt directory if needed.
pub fn write_prompt_file(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
