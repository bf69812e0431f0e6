//! Cumulative usage counters.
//!
//! [`UsageStats`] is persisted alongside the settings and only ever grows,
//! except through the explicit reset hooks driven by control messages.

use serde::{Deserialize, Serialize};

/// Token usage reported by the generation service for a single call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced in the completion.
    pub completion_tokens: u64,
    /// Total tokens billed for the call.
    pub total_tokens: u64,
}

/// Persistent, cumulative usage counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageStats {
    /// Sum of prompt tokens.
    pub prompt_tokens: u64,
    /// Sum of completion tokens.
    pub completion_tokens: u64,
    /// Sum of total tokens.
    pub total_tokens: u64,
    /// Number of generation requests issued (turns and summaries alike).
    pub api_requests: u64,
}

impl UsageStats {
    /// Count one outgoing generation request.
    pub fn record_request(&mut self) {
        self.api_requests = self.api_requests.saturating_add(1);
    }

    /// Add a call's token usage to the running totals.
    pub fn record_usage(&mut self, usage: &TokenUsage) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(usage.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(usage.completion_tokens);
        self.total_tokens = self.total_tokens.saturating_add(usage.total_tokens);
    }

    /// Zero the three token counters, keeping the request count.
    pub fn reset_tokens(&mut self) {
        self.prompt_tokens = 0;
        self.completion_tokens = 0;
        self.total_tokens = 0;
    }

    /// Zero the request counter, keeping the token counters.
    pub fn reset_requests(&mut self) {
        self.api_requests = 0;
    }
}
