//! Recent chat history.

use std::collections::VecDeque;

use wisp_core::ChatLogEntry;

/// Ring buffer of the most recent chat lines.
#[derive(Clone, Debug)]
pub struct ChatLog {
    entries: VecDeque<ChatLogEntry>,
    capacity: usize,
}

impl ChatLog {
    /// Empty log holding at most `capacity` lines (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Log seeded with `entries`, keeping the newest `capacity`.
    pub fn with_entries(capacity: usize, entries: impl IntoIterator<Item = ChatLogEntry>) -> Self {
        let mut log = Self::new(capacity);
        for entry in entries {
            log.push(entry);
        }
        log
    }

    /// Append a line, evicting the oldest when full.
    pub fn push(&mut self, entry: ChatLogEntry) {
        if self.entries.len() == self.capacity {
            let _ = self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Change the capacity, keeping the newest lines.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            let _ = self.entries.pop_front();
        }
    }

    /// Maximum number of lines.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of lines held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every line.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lines, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatLogEntry> {
        self.entries.iter()
    }

    /// Owned copy of the lines, oldest first.
    pub fn to_vec(&self) -> Vec<ChatLogEntry> {
        self.entries.iter().cloned().collect()
    }

    /// `speaker: text` lines joined by newlines.
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: usize) -> ChatLogEntry {
        ChatLogEntry::new("User", format!("m{i}"))
    }

    #[test]
    fn evicts_oldest() {
        let mut log = ChatLog::new(3);
        for i in 0..5 {
            log.push(entry(i));
            assert!(log.len() <= 3);
        }
        let texts: Vec<_> = log.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["m2", "m3", "m4"]);
    }

    #[test]
    fn shrinking_keeps_newest() {
        let mut log = ChatLog::with_entries(5, (0..5).map(entry));
        log.set_capacity(2);
        assert_eq!(log.render(), "User: m3\nUser: m4");
        log.set_capacity(4);
        log.push(entry(9));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn seeding_respects_capacity() {
        let log = ChatLog::with_entries(2, (0..4).map(entry));
        assert_eq!(log.to_vec(), vec![entry(2), entry(3)]);
    }

    #[test]
    fn zero_capacity_clamped() {
        let mut log = ChatLog::new(0);
        log.push(entry(0));
        assert_eq!(log.capacity(), 1);
        assert_eq!(log.len(), 1);
    }
}
