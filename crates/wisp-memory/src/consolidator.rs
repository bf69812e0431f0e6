//! Memory consolidation.
//!
//! One cycle runs after every successful turn:
//!
//! 1. the turn content is summarized into a new STM entry
//! 2. a full STM folds its oldest batch into one MTM entry
//! 3. a full MTM folds its oldest batch into one LTM entry
//! 4. a full LTM compacts its oldest batch into one entry at the end
//!
//! A stage whose summary comes back empty leaves its tiers untouched; the
//! following stages still check their own thresholds.

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};
use wisp_core::TierKind;
use wisp_settings::MemoryCapacities;

use crate::store::{TieredMemory, bullet_lines};

/// Produces summaries for the consolidator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `text` with `tier`'s summarizer prompt.
    ///
    /// `None` (or an empty string) means no summary could be produced.
    async fn summarize(&self, tier: TierKind, text: &str) -> Option<String>;
}

/// Entries taken from a full tier: half of it, or all of a tier smaller
/// than four.
pub fn batch_size(capacity: usize) -> usize {
    if capacity >= 4 { capacity / 2 } else { capacity }
}

/// What one cycle changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    /// A new STM entry was added.
    pub stm_added: bool,
    /// STM entries folded into MTM.
    pub stm_to_mtm: usize,
    /// MTM entries folded into LTM.
    pub mtm_to_ltm: usize,
    /// LTM entries compacted in place.
    pub ltm_compacted: usize,
}

/// Runs consolidation cycles against a [`TieredMemory`].
#[derive(Clone, Debug, Default)]
pub struct MemoryConsolidator {
    capacities: MemoryCapacities,
}

impl MemoryConsolidator {
    /// Consolidator with the given tier caps.
    pub fn new(capacities: MemoryCapacities) -> Self {
        Self { capacities }
    }

    /// Current caps.
    pub fn capacities(&self) -> &MemoryCapacities {
        &self.capacities
    }

    /// Replace the caps.
    pub fn set_capacities(&mut self, capacities: MemoryCapacities) {
        self.capacities = capacities;
    }

    /// Run one cycle for a turn's raw output. Empty content is a no-op.
    #[instrument(skip_all, fields(content_len = turn_content.len()))]
    pub async fn consolidate(
        &self,
        memory: &mut TieredMemory,
        summarizer: &dyn Summarizer,
        turn_content: &str,
    ) -> ConsolidationReport {
        let mut report = ConsolidationReport::default();
        if turn_content.is_empty() {
            return report;
        }
        info!("memory consolidation started");

        match non_empty(summarizer.summarize(TierKind::Stm, turn_content).await) {
            Some(entry) => {
                persist(memory.push(TierKind::Stm, entry));
                report.stm_added = true;
            }
            None => warn!("no STM summary for this turn"),
        }

        report.stm_to_mtm = self.fold(memory, summarizer, TierKind::Stm, TierKind::Mtm).await;
        report.mtm_to_ltm = self.fold(memory, summarizer, TierKind::Mtm, TierKind::Ltm).await;
        report.ltm_compacted = self.compact_ltm(memory, summarizer).await;

        info!(?report, "memory consolidation complete");
        report
    }

    /// Move the oldest batch of a full `from` tier into one `to` entry.
    async fn fold(
        &self,
        memory: &mut TieredMemory,
        summarizer: &dyn Summarizer,
        from: TierKind,
        to: TierKind,
    ) -> usize {
        let capacity = self.capacities.get(from);
        let Some(count) = full_batch(memory.len(from), capacity) else {
            return 0;
        };

        let batch = bullet_lines(&memory.entries(from)[..count]);
        let Some(summary) = non_empty(summarizer.summarize(to, &batch).await) else {
            warn!(%from, %to, "fold skipped: no summary");
            return 0;
        };

        let remaining = memory.entries(from)[count..].to_vec();
        persist(memory.push(to, summary));
        persist(memory.replace(from, remaining));
        info!(%from, %to, count, "tier folded");
        count
    }

    /// Replace the oldest batch of a full LTM with one summary appended
    /// after the remaining entries.
    async fn compact_ltm(&self, memory: &mut TieredMemory, summarizer: &dyn Summarizer) -> usize {
        let capacity = self.capacities.get(TierKind::Ltm);
        let Some(count) = full_batch(memory.len(TierKind::Ltm), capacity) else {
            return 0;
        };

        let entries = memory.entries(TierKind::Ltm);
        let batch = bullet_lines(&entries[..count]);
        let mut compacted = entries[count..].to_vec();
        let Some(summary) = non_empty(summarizer.summarize(TierKind::Ltm, &batch).await) else {
            warn!("LTM compaction skipped: no summary");
            return 0;
        };

        compacted.push(summary);
        persist(memory.replace(TierKind::Ltm, compacted));
        info!(count, "long-term memory compacted");
        count
    }
}

/// Batch size when `len` has reached `capacity`.
fn full_batch(len: usize, capacity: usize) -> Option<usize> {
    (capacity > 0 && len >= capacity).then(|| batch_size(capacity))
}

fn non_empty(summary: Option<String>) -> Option<String> {
    summary
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn persist(result: crate::Result<()>) {
    if let Err(e) = result {
        error!(error = %e, "failed to persist memory tier");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
