//! Memory tier vocabulary shared by the consolidator, the prompt assembler,
//! and the status events.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three memory tiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierKind {
    /// Short-term memory: one summary per turn.
    Stm,
    /// Medium-term memory: summaries of STM batches.
    Mtm,
    /// Long-term memory: summaries of MTM batches, compacted in place.
    Ltm,
}

impl TierKind {
    /// All tiers, shortest-lived first.
    pub const ALL: [TierKind; 3] = [TierKind::Stm, TierKind::Mtm, TierKind::Ltm];

    /// Lowercase identifier (`stm`, `mtm`, `ltm`), also used as file stem.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stm => "stm",
            Self::Mtm => "mtm",
            Self::Ltm => "ltm",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time copy of all three tiers, oldest entry first.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    /// Short-term entries.
    pub stm: Vec<String>,
    /// Medium-term entries.
    pub mtm: Vec<String>,
    /// Long-term entries.
    pub ltm: Vec<String>,
}

impl MemorySnapshot {
    /// Entries of one tier.
    pub fn tier(&self, kind: TierKind) -> &[String] {
        match kind {
            TierKind::Stm => &self.stm,
            TierKind::Mtm => &self.mtm,
            TierKind::Ltm => &self.ltm,
        }
    }
}
