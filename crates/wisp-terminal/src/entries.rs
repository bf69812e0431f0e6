//! Entry-structured text.
//!
//! `.txt` files hold `{entry-N : body}` blocks separated by newlines. Bodies
//! may contain balanced braces, so removal scans by depth rather than
//! stopping at the first `}`.

use std::sync::LazyLock;

use regex::Regex;

/// Written to a file with no content.
pub const EMPTY_MARKER: &str = "[empty]";

/// Older spelling, also read as empty.
pub const LEGACY_EMPTY_MARKER: &str = "(empty)";

static ENTRY_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\{entry-(\d+)").unwrap_or_else(|e| panic!("{e}"))
});

/// Content with surrounding whitespace trimmed, or `""` for an empty marker.
pub fn effective_content(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed == EMPTY_MARKER || trimmed == LEGACY_EMPTY_MARKER {
        ""
    } else {
        trimmed
    }
}

/// Highest entry number present in `content`.
pub fn max_entry(content: &str) -> Option<u64> {
    ENTRY_NUMBER
        .captures_iter(content)
        .filter_map(|c| c.get(1)?.as_str().parse::<u64>().ok())
        .max()
}

/// Format a new entry block.
pub fn format_entry(number: u64, body: &str) -> String {
    format!("{{entry-{number} : {body}}}")
}

/// Remove every `{entry-<number> : ...}` block and the whitespace after it.
///
/// Returns `None` when no such block exists. A block without its closing
/// brace is left alone.
pub fn remove_entry(content: &str, number: u64) -> Option<String> {
    let mut out = String::with_capacity(content.len());
    let mut removed = false;
    let mut pos = 0;

    for m in ENTRY_NUMBER.captures_iter(content) {
        let (Some(whole), Some(digits)) = (m.get(0), m.get(1)) else {
            continue;
        };
        if whole.start() < pos || digits.as_str().parse::<u64>().ok() != Some(number) {
            continue;
        }
        let after_digits = &content[whole.end()..];
        let colon = after_digits.len() - after_digits.trim_start().len();
        if !after_digits[colon..].starts_with(':') {
            continue;
        }
        let Some(end) = block_end(content, whole.start()) else {
            continue;
        };

        out.push_str(&content[pos..whole.start()]);
        let rest = &content[end..];
        pos = end + (rest.len() - rest.trim_start().len());
        removed = true;
    }

    if !removed {
        return None;
    }
    out.push_str(&content[pos..]);
    Some(out)
}

/// Byte offset just past the brace matching the `{` at `start`.
fn block_end(text: &str, start: usize) -> Option<usize> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_markers() {
        assert_eq!(effective_content("  [empty]\n"), "");
        assert_eq!(effective_content("(empty)"), "");
        assert_eq!(effective_content(" {entry-1 : a} "), "{entry-1 : a}");
    }

    #[test]
    fn max_entry_scans_case_insensitively() {
        assert_eq!(max_entry("{entry-2 : a}\n{ENTRY-10 : b}\n{entry-3 : c}"), Some(10));
        assert_eq!(max_entry("nothing"), None);
    }

    #[test]
    fn remove_middle_entry() {
        let content = "{entry-1 : a}\n{entry-2 : b}\n{entry-3 : c}";
        assert_eq!(
            remove_entry(content, 2).as_deref(),
            Some("{entry-1 : a}\n{entry-3 : c}")
        );
    }

    #[test]
    fn remove_respects_nested_braces() {
        let content = "{entry-1 : uses {braces} inside}\n{entry-2 : b}";
        assert_eq!(remove_entry(content, 1).as_deref(), Some("{entry-2 : b}"));
    }

    #[test]
    fn remove_does_not_match_prefix_numbers() {
        let content = "{entry-12 : a}\n{entry-1 : b}";
        assert_eq!(remove_entry(content, 1).as_deref(), Some("{entry-12 : a}\n"));
        assert_eq!(remove_entry("{entry-12 : a}", 1), None);
    }

    #[test]
    fn remove_missing_entry() {
        assert_eq!(remove_entry("{entry-1 : a}", 4), None);
        assert_eq!(remove_entry("{entry-1 : unclosed", 1), None);
    }

    #[test]
    fn format() {
        assert_eq!(format_entry(3, "fact"), "{entry-3 : fact}");
    }
}
