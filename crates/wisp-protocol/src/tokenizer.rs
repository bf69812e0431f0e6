//! Brace block tokenizer.
//!
//! ```text
//! block := '{' key (':' body)? '}'
//! ```
//!
//! The scanner walks the text looking for `{`. At each candidate it finds the
//! matching `}` by brace depth, splits the inside at the first `:`, and
//! classifies the key. A candidate that does not classify is skipped one
//! character at a time, so blocks nested inside rejected text are still
//! found. Recognized blocks are consumed whole; braces inside their bodies
//! are never scanned again.
//!
//! Keys are matched ASCII case-insensitively after whitespace around hyphens
//! is collapsed, so `{ Self - Prompt - From - Wisp : ...}` is a self-prompt
//! for an agent named `Wisp`.

use crate::command::{Block, Command};

/// The command grammar for one agent name.
///
/// The utterance and self-prompt keys embed the agent's name, so a new
/// grammar must be built whenever the name changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grammar {
    agent_name: String,
    agent_key: String,
}

impl Grammar {
    /// Build the grammar for `agent_name`.
    pub fn new(agent_name: &str) -> Self {
        Self {
            agent_name: agent_name.to_string(),
            agent_key: normalize_key(agent_name),
        }
    }

    /// Agent name the grammar was built for.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Every recognized block, in order of appearance.
    pub fn extract(&self, text: &str) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut pos = 0;
        while let Some(offset) = text[pos..].find('{') {
            let start = pos + offset;
            match self.parse_block(text, start) {
                Some((command, end)) => {
                    blocks.push(Block {
                        command,
                        raw: text[start..end].to_string(),
                    });
                    pos = end;
                }
                // '{' is one byte, so start + 1 is a char boundary
                None => pos = start + 1,
            }
        }
        blocks
    }

    /// Parse the block opening at byte `start`. Returns the command and the
    /// byte offset just past the closing brace.
    fn parse_block(&self, text: &str, start: usize) -> Option<(Command, usize)> {
        let end = find_block_end(text, start)?;
        let inner = &text[start + 1..end - 1];

        let (key, body) = match inner.find(':') {
            Some(colon) => (&inner[..colon], Some(inner[colon + 1..].trim())),
            None => (inner, None),
        };
        if key.contains(['{', '}']) {
            return None;
        }

        let key = normalize_key(key);
        self.classify(&key, body).map(|command| (command, end))
    }

    fn classify(&self, key: &str, body: Option<&str>) -> Option<Command> {
        match body {
            None => classify_bare(key),
            Some(body) => self.classify_with_body(key, body),
        }
    }

    fn classify_with_body(&self, key: &str, body: &str) -> Option<Command> {
        let body = body.to_string();
        if key.eq_ignore_ascii_case("thinking") {
            return Some(Command::Thinking { body });
        }
        if let Some(name) = strip_prefix_ci(key, "push-update-") {
            return is_valid_name(name).then(|| Command::PushUpdate {
                name: name.to_string(),
                body,
            });
        }
        if strip_suffix_ci(key, "-says").is_some_and(|who| who.eq_ignore_ascii_case(&self.agent_key))
        {
            return Some(Command::Says { body });
        }
        if strip_prefix_ci(key, "self-prompt-from-")
            .is_some_and(|who| who.eq_ignore_ascii_case(&self.agent_key))
        {
            return Some(Command::SelfPrompt { body });
        }
        None
    }
}

fn classify_bare(key: &str) -> Option<Command> {
    if let Some(name) = strip_prefix_ci(key, "read-file-") {
        return is_valid_name(name).then(|| Command::ReadFile {
            name: name.to_string(),
        });
    }
    if let Some(name) = strip_prefix_ci(key, "create-file-") {
        return is_valid_name(name).then(|| Command::CreateFile {
            name: name.to_string(),
        });
    }
    if let Some(name) = strip_prefix_ci(key, "delete-file-") {
        return is_valid_name(name).then(|| Command::DeleteFile {
            name: name.to_string(),
        });
    }
    if key.eq_ignore_ascii_case("ping-user") {
        return Some(Command::PingUser);
    }
    parse_entry_delete(key)
}

/// `<name>-entry-<N>-delete`
fn parse_entry_delete(key: &str) -> Option<Command> {
    let head = strip_suffix_ci(key, "-delete")?;
    let marker = "-entry-";
    let lower = head.to_ascii_lowercase();
    let split = lower.rfind(marker)?;
    let name = &head[..split];
    let digits = &head[split + marker.len()..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) || !is_valid_name(name) {
        return None;
    }
    let entry = digits.parse().ok()?;
    Some(Command::DeleteEntry {
        name: name.to_string(),
        entry,
    })
}

/// Byte offset just past the `}` balancing the `{` at `start`.
fn find_block_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Trim, and collapse whitespace around every hyphen.
pub(crate) fn normalize_key(key: &str) -> String {
    key.trim()
        .split('-')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("-")
}

/// Filename-ish argument: word characters, dots, and hyphens.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-')
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

/// Concatenation of the blocks' source text, in order.
pub fn sanitize(blocks: &[Block]) -> String {
    blocks.iter().map(|b| b.raw.as_str()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
