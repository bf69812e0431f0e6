//! On-disk tiers.
//!
//! Each tier lives in `<dir>/<tier>.json` as `{"entries": [...]}`, oldest
//! entry first. Every mutation is written through immediately.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use wisp_core::{MemorySnapshot, TierKind};

use crate::errors::{MemoryError, Result};

#[derive(Serialize, Deserialize)]
struct TierFile {
    entries: Vec<String>,
}

/// The three tiers, held in memory and mirrored to disk.
#[derive(Debug)]
pub struct TieredMemory {
    dir: PathBuf,
    tiers: MemorySnapshot,
}

impl TieredMemory {
    /// Load all tiers from `dir`, creating it if needed.
    ///
    /// A missing or malformed tier file is replaced by an empty one.
    pub fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| MemoryError::Io {
            path: dir.clone(),
            source,
        })?;

        let mut memory = Self {
            dir,
            tiers: MemorySnapshot::default(),
        };
        for tier in TierKind::ALL {
            match memory.read_tier(tier) {
                Ok(entries) => *memory.tier_mut(tier) = entries,
                Err(e) => {
                    warn!(tier = %tier, error = %e, "resetting memory tier");
                    memory.save(tier)?;
                }
            }
        }
        info!(
            stm = memory.tiers.stm.len(),
            mtm = memory.tiers.mtm.len(),
            ltm = memory.tiers.ltm.len(),
            "memory loaded"
        );
        Ok(memory)
    }

    /// Directory holding the tier files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one tier's file.
    pub fn tier_path(&self, tier: TierKind) -> PathBuf {
        self.dir.join(format!("{tier}.json"))
    }

    /// Entries of one tier, oldest first.
    pub fn entries(&self, tier: TierKind) -> &[String] {
        self.tiers.tier(tier)
    }

    /// Number of entries in one tier.
    pub fn len(&self, tier: TierKind) -> usize {
        self.entries(tier).len()
    }

    /// Whether every tier is empty.
    pub fn is_empty(&self) -> bool {
        TierKind::ALL.iter().all(|&t| self.len(t) == 0)
    }

    /// Copy of all tiers.
    pub fn snapshot(&self) -> MemorySnapshot {
        self.tiers.clone()
    }

    /// Append one entry and persist the tier.
    pub fn push(&mut self, tier: TierKind, entry: String) -> Result<()> {
        self.tier_mut(tier).push(entry);
        self.save(tier)
    }

    /// Replace a tier wholesale and persist it.
    pub fn replace(&mut self, tier: TierKind, entries: Vec<String>) -> Result<()> {
        *self.tier_mut(tier) = entries;
        self.save(tier)
    }

    /// Empty every tier and persist.
    pub fn wipe(&mut self) -> Result<()> {
        for tier in TierKind::ALL {
            self.replace(tier, Vec::new())?;
        }
        Ok(())
    }

    fn tier_mut(&mut self, tier: TierKind) -> &mut Vec<String> {
        match tier {
            TierKind::Stm => &mut self.tiers.stm,
            TierKind::Mtm => &mut self.tiers.mtm,
            TierKind::Ltm => &mut self.tiers.ltm,
        }
    }

    fn read_tier(&self, tier: TierKind) -> Result<Vec<String>> {
        let path = self.tier_path(tier);
        let text = std::fs::read_to_string(&path).map_err(|source| MemoryError::Io {
            path: path.clone(),
            source,
        })?;
        let file: TierFile =
            serde_json::from_str(&text).map_err(|source| MemoryError::Json { path, source })?;
        Ok(file.entries)
    }

    fn save(&self, tier: TierKind) -> Result<()> {
        let path = self.tier_path(tier);
        let file = TierFile {
            entries: self.entries(tier).to_vec(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|source| MemoryError::Json {
            path: path.clone(),
            source,
        })?;
        std::fs::write(&path, json).map_err(|source| MemoryError::Io { path, source })
    }
}

/// Render entries as `- entry` lines.
pub fn bullet_lines(entries: &[String]) -> String {
    entries
        .iter()
        .map(|e| format!("- {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn fresh_dir_gets_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let memory = TieredMemory::load(dir.path().join("memory")).unwrap();
        assert!(memory.is_empty());
        for tier in TierKind::ALL {
            let text = std::fs::read_to_string(memory.tier_path(tier)).unwrap();
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            assert_eq!(value, serde_json::json!({"entries": []}));
        }
    }

    #[test]
    fn push_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = TieredMemory::load(dir.path()).unwrap();
        memory.push(TierKind::Mtm, "a".into()).unwrap();
        memory.push(TierKind::Mtm, "b".into()).unwrap();

        let reloaded = TieredMemory::load(dir.path()).unwrap();
        assert_eq!(reloaded.entries(TierKind::Mtm), ["a", "b"]);
        assert_eq!(reloaded.len(TierKind::Stm), 0);
    }

    #[test]
    fn malformed_tier_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ltm.json"), r#"{"wrong": 1}"#).unwrap();
        std::fs::write(dir.path().join("stm.json"), r#"{"entries": ["kept"]}"#).unwrap();

        let memory = TieredMemory::load(dir.path()).unwrap();
        assert_eq!(memory.entries(TierKind::Stm), ["kept"]);
        assert!(memory.entries(TierKind::Ltm).is_empty());
        let text = std::fs::read_to_string(dir.path().join("ltm.json")).unwrap();
        assert!(text.contains("entries"));
    }

    #[test]
    fn malformed_tier_reads_as_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let memory = TieredMemory::load(dir.path()).unwrap();
        let path = memory.tier_path(TierKind::Mtm);
        std::fs::write(&path, "not json").unwrap();

        assert_matches!(
            memory.read_tier(TierKind::Mtm),
            Err(MemoryError::Json { path: bad, .. }) if bad == path
        );
    }

    #[test]
    fn wipe_empties_all() {
        let dir = tempfile::tempdir().unwrap();
        let mut memory = TieredMemory::load(dir.path()).unwrap();
        memory.push(TierKind::Stm, "x".into()).unwrap();
        memory.push(TierKind::Ltm, "y".into()).unwrap();
        memory.wipe().unwrap();
        assert!(memory.is_empty());
        assert!(TieredMemory::load(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn bullets() {
        assert_eq!(bullet_lines(&["a".into(), "b".into()]), "- a\n- b");
        assert_eq!(bullet_lines(&[]), "");
    }
}
