//! Sandbox limits and filename rules.

use std::sync::LazyLock;

use regex::Regex;

/// Addressable file names: one stem of word characters or hyphens, one
/// alphanumeric extension.
static FILENAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9]+$").unwrap_or_else(|e| panic!("{e}"))
});

/// Whether `name` may be addressed inside the sandbox.
pub fn is_valid_filename(name: &str) -> bool {
    FILENAME_PATTERN.is_match(name)
}

/// Lowercased extension including the dot, if any.
pub fn extension_of(name: &str) -> Option<String> {
    name.rfind('.').map(|i| name[i..].to_ascii_lowercase())
}

/// Limits applied to file commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalPolicy {
    /// Character cap for entry-structured `.txt` files.
    pub max_file_chars: usize,
    /// Maximum number of files in the sandbox.
    pub max_files: usize,
    /// Extensions `create-file` accepts, dot included, lowercase.
    pub allowed_extensions: Vec<String>,
}

impl Default for TerminalPolicy {
    fn default() -> Self {
        Self {
            max_file_chars: 500,
            max_files: 10,
            allowed_extensions: vec![".txt".to_string()],
        }
    }
}

impl TerminalPolicy {
    /// Whether `create-file` accepts `name`'s extension.
    pub fn allows(&self, name: &str) -> bool {
        extension_of(name).is_some_and(|ext| {
            self.allowed_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        })
    }
}
