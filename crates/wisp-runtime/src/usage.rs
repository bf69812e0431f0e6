//! Usage counters shared by turns and summaries.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, warn};
use wisp_core::{EngineEvent, EventEmitter, TokenUsage, UsageStats};
use wisp_settings::save_usage_stats;

/// Cumulative usage counters, persisted and published on every change.
///
/// Each change writes only the stats section of `config.json` and emits
/// `update_persistent_stats` with the new totals.
#[derive(Debug)]
pub struct UsageRecorder {
    stats: Mutex<UsageStats>,
    config_path: PathBuf,
    events: EventEmitter,
}

impl UsageRecorder {
    /// Recorder starting from `initial`.
    pub fn new(initial: UsageStats, config_path: impl Into<PathBuf>, events: EventEmitter) -> Self {
        Self {
            stats: Mutex::new(initial),
            config_path: config_path.into(),
            events,
        }
    }

    /// Current totals.
    pub fn snapshot(&self) -> UsageStats {
        *self.stats.lock()
    }

    /// Count one outgoing generation request.
    pub fn record_request(&self) {
        self.update(UsageStats::record_request);
    }

    /// Add a call's reported token usage.
    pub fn record_usage(&self, usage: &TokenUsage) {
        debug!(
            prompt = usage.prompt_tokens,
            completion = usage.completion_tokens,
            total = usage.total_tokens,
            "token usage"
        );
        self.update(|stats| stats.record_usage(usage));
    }

    /// Zero the token counters.
    pub fn reset_tokens(&self) {
        self.update(UsageStats::reset_tokens);
    }

    /// Zero the request counter.
    pub fn reset_requests(&self) {
        self.update(UsageStats::reset_requests);
    }

    /// Emit the current totals without changing them.
    pub fn publish(&self) {
        self.events
            .emit(EngineEvent::UpdatePersistentStats(self.snapshot()));
    }

    fn update(&self, change: impl FnOnce(&mut UsageStats)) {
        let stats = {
            let mut guard = self.stats.lock();
            change(&mut guard);
            *guard
        };
        if let Err(e) = save_usage_stats(&stats, &self.config_path) {
            warn!(error = %e, "failed to persist usage stats");
        }
        self.events.emit(EngineEvent::UpdatePersistentStats(stats));
    }
}
