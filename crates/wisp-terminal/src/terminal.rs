//! The sandboxed file store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::entries::{self, EMPTY_MARKER};
use crate::errors::{Result, TerminalError};
use crate::marks::EntryMarks;
use crate::policy::{TerminalPolicy, extension_of, is_valid_filename};

/// What a successful push did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// A new entry was appended to a `.txt` file.
    Appended {
        /// Number of the new entry.
        entry: u64,
    },
    /// A non-entry file was replaced whole.
    Overwritten,
}

/// A directory of small text files the agent manages through commands.
///
/// Only names matching the filename pattern are addressable; anything else
/// in the directory is invisible to listings and commands.
#[derive(Debug)]
pub struct VirtualTerminal {
    root: PathBuf,
    policy: TerminalPolicy,
    marks: EntryMarks,
}

impl VirtualTerminal {
    /// Open (creating if needed) the sandbox at `root`.
    pub fn open(root: impl Into<PathBuf>, policy: TerminalPolicy) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| TerminalError::io(&root.display().to_string(), e))?;
        let marks = EntryMarks::load(&root);
        debug!(root = %root.display(), "virtual terminal opened");
        Ok(Self {
            root,
            policy,
            marks,
        })
    }

    /// Sandbox root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current limits.
    pub fn policy(&self) -> &TerminalPolicy {
        &self.policy
    }

    /// Replace the limits.
    pub fn set_policy(&mut self, policy: TerminalPolicy) {
        self.policy = policy;
    }

    /// Addressable files, sorted by name.
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = fs::read_dir(&self.root).map_err(|e| TerminalError::io(".", e))?;
        let mut names: Vec<String> = dir
            .filter_map(std::result::Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_valid_filename(name))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Full text of `name`. Undecodable bytes are replaced.
    pub fn read(&self, name: &str) -> Result<String> {
        let path = self.resolve(name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(TerminalError::NotFound {
                name: name.to_string(),
            }),
            Err(e) => Err(TerminalError::io(name, e)),
        }
    }

    /// Append an entry to a `.txt` file, or replace any other file whole.
    pub fn push(&mut self, name: &str, body: &str) -> Result<PushOutcome> {
        let path = self.resolve(name)?;
        if !path.is_file() {
            return Err(TerminalError::NotFound {
                name: name.to_string(),
            });
        }

        if extension_of(name).as_deref() != Some(".txt") {
            fs::write(&path, body).map_err(|e| TerminalError::io(name, e))?;
            info!(file = name, "file overwritten");
            return Ok(PushOutcome::Overwritten);
        }

        let raw = self.read(name)?;
        let current = entries::effective_content(&raw);
        let highest = entries::max_entry(current)
            .unwrap_or(0)
            .max(self.marks.get(name));
        let entry = highest + 1;
        let block = entries::format_entry(entry, body);

        let limit = self.policy.max_file_chars;
        if current.chars().count() + block.chars().count() > limit {
            return Err(TerminalError::Capacity {
                name: name.to_string(),
                limit,
                content: raw,
            });
        }

        let updated = if current.is_empty() {
            block
        } else {
            format!("{current}\n{block}")
        };
        fs::write(&path, updated).map_err(|e| TerminalError::io(name, e))?;
        self.marks.record(name, entry)?;
        info!(file = name, entry, "entry appended");
        Ok(PushOutcome::Appended { entry })
    }

    /// Remove entry `entry` from `name`.
    pub fn delete_entry(&mut self, name: &str, entry: u64) -> Result<()> {
        let path = self.resolve(name)?;
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TerminalError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(TerminalError::io(name, e)),
        };

        let Some(remaining) = entries::remove_entry(&content, entry) else {
            return Err(TerminalError::EntryNotFound {
                name: name.to_string(),
                entry,
            });
        };
        let remaining = match remaining.trim() {
            "" => EMPTY_MARKER,
            trimmed => trimmed,
        };
        fs::write(&path, remaining).map_err(|e| TerminalError::io(name, e))?;
        info!(file = name, entry, "entry deleted");
        Ok(())
    }

    /// Create `name` holding the empty marker.
    pub fn create(&self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        if !self.policy.allows(name) {
            return Err(TerminalError::InvalidExtension {
                name: name.to_string(),
                allowed: self.policy.allowed_extensions.clone(),
            });
        }

        let files = self.list()?;
        if files.len() >= self.policy.max_files {
            return Err(TerminalError::FileLimit {
                name: name.to_string(),
                limit: self.policy.max_files,
                files,
            });
        }
        if path.exists() {
            return Err(TerminalError::AlreadyExists {
                name: name.to_string(),
            });
        }

        fs::write(&path, EMPTY_MARKER).map_err(|e| TerminalError::io(name, e))?;
        info!(file = name, "file created");
        Ok(())
    }

    /// Remove `name` and forget its entry numbering.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(TerminalError::NotFound {
                    name: name.to_string(),
                });
            }
            Err(e) => return Err(TerminalError::io(name, e)),
        }
        self.marks.forget(name)?;
        info!(file = name, "file deleted");
        Ok(())
    }

    /// Reset every file to the empty marker, keeping the names.
    pub fn wipe(&mut self) -> Result<()> {
        for name in self.list()? {
            if let Err(e) = fs::write(self.root.join(&name), EMPTY_MARKER) {
                warn!(file = %name, error = %e, "failed to wipe terminal file");
            }
        }
        self.marks.clear()
    }

    /// Map an addressable name to its path inside the root.
    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let invalid = || TerminalError::InvalidName {
            name: name.to_string(),
        };
        if !is_valid_filename(name) {
            return Err(invalid());
        }
        let path = self.root.join(name);

        // A symlink planted in the sandbox must not lead out of it.
        if path.exists() {
            let root = self.root.canonicalize().map_err(|e| TerminalError::io(name, e))?;
            let target = path.canonicalize().map_err(|e| TerminalError::io(name, e))?;
            if !target.starts_with(&root) {
                return Err(invalid());
            }
        }
        Ok(path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
