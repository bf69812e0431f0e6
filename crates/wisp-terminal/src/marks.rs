//! Entry high-water marks.
//!
//! Entry numbers never repeat within a file's lifetime, even after the
//! highest entry is deleted. The highest number ever issued per file is kept
//! in `.entry-marks.json` in the sandbox root; the leading dot keeps it
//! outside the addressable filename pattern.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::{Result, TerminalError};

/// File name of the marks store inside the sandbox root.
pub const MARKS_FILE: &str = ".entry-marks.json";

/// Highest entry number issued per file.
#[derive(Debug, Default)]
pub struct EntryMarks {
    path: PathBuf,
    marks: BTreeMap<String, u64>,
}

#[derive(Serialize, Deserialize)]
struct MarksFile {
    #[serde(default)]
    marks: BTreeMap<String, u64>,
}

impl EntryMarks {
    /// Load the store under `root`. A missing or unreadable store starts empty.
    pub fn load(root: &Path) -> Self {
        let path = root.join(MARKS_FILE);
        let marks = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<MarksFile>(&text) {
                Ok(file) => file.marks,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt entry marks");
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self { path, marks }
    }

    /// Highest number issued for `name`, or 0.
    pub fn get(&self, name: &str) -> u64 {
        self.marks.get(name).copied().unwrap_or(0)
    }

    /// Record `number` as issued for `name` and persist.
    pub fn record(&mut self, name: &str, number: u64) -> Result<()> {
        let mark = self.marks.entry(name.to_string()).or_insert(0);
        if number <= *mark {
            return Ok(());
        }
        *mark = number;
        self.save()
    }

    /// Forget `name` and persist.
    pub fn forget(&mut self, name: &str) -> Result<()> {
        if self.marks.remove(name).is_some() {
            self.save()?;
        }
        Ok(())
    }

    /// Forget every file and persist.
    pub fn clear(&mut self) -> Result<()> {
        self.marks.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        let file = MarksFile {
            marks: self.marks.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| TerminalError::io(MARKS_FILE, e.into()))?;
        std::fs::write(&self.path, json).map_err(|e| TerminalError::io(MARKS_FILE, e))
    }
}
