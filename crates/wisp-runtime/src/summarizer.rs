//! Summaries through the generation service.

use async_trait::async_trait;
use tracing::{debug, warn};
use wisp_core::{EngineEvent, EventEmitter, NewMessage, TierKind};
use wisp_llm::gemini::is_failure_sentinel;
use wisp_llm::{GenerationParams, GenerationService};
use wisp_memory::Summarizer;
use wisp_settings::{SummarizerPrompts, TEXT_TO_SUMMARIZE, substitute_names};

use crate::usage::UsageRecorder;

/// [`Summarizer`] that asks the generation service.
///
/// Every call is counted and audited like a turn: the prompt goes out as
/// `update_full_context` tagged `summarizer_context` and the reply as a raw
/// `summarizer_output` message.
pub struct TurnSummarizer<'a> {
    /// Service used for summaries.
    pub service: &'a dyn GenerationService,
    /// Prompt per stage.
    pub prompts: &'a SummarizerPrompts,
    /// Sampling parameters.
    pub params: GenerationParams,
    /// Agent display name.
    pub agent_name: &'a str,
    /// User display name.
    pub user_name: &'a str,
    /// Audit channel.
    pub events: &'a EventEmitter,
    /// Usage counters.
    pub usage: &'a UsageRecorder,
}

#[async_trait]
impl Summarizer for TurnSummarizer<'_> {
    async fn summarize(&self, tier: TierKind, text: &str) -> Option<String> {
        if !self.service.is_ready() {
            warn!(%tier, "summary skipped: service not ready");
            return None;
        }
        let template = self.prompts.get(tier);
        if template.trim().is_empty() {
            warn!(%tier, "summary skipped: empty summarizer prompt");
            return None;
        }

        let prompt = substitute_names(template, self.agent_name, self.user_name)
            .replace(TEXT_TO_SUMMARIZE, text);
        self.events.emit(EngineEvent::UpdateFullContext {
            full_context: prompt.clone(),
            tag: Some("summarizer_context".to_string()),
        });

        self.usage.record_request();
        let generation = match self.service.generate(&prompt, &self.params).await {
            Ok(generation) => generation,
            Err(e) => {
                warn!(%tier, error = %e, category = e.category(), "summary generation failed");
                return None;
            }
        };
        if let Some(usage) = &generation.usage {
            self.usage.record_usage(usage);
        }

        let summary = generation.text.trim().to_string();
        self.events.emit(EngineEvent::NewMessage(NewMessage::Raw {
            raw_log: summary.clone(),
            usage: generation.usage,
            tag: "summarizer_output".to_string(),
        }));
        if is_failure_sentinel(&summary) {
            warn!(%tier, output = %summary, "summary generation returned no text");
            return None;
        }
        debug!(%tier, chars = summary.len(), "summary produced");
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wisp_core::UsageStats;
    use wisp_llm::gemini::{EMPTY_RESPONSE_SENTINEL, blocked_sentinel};
    use wisp_llm::testing::ScriptedService;
    use wisp_memory::{MemoryConsolidator, TieredMemory};

    fn prompts() -> SummarizerPrompts {
        SummarizerPrompts {
            stm: "Summarize for {NAME}:\n__TEXT_TO_SUMMARIZE__".into(),
            mtm: String::new(),
            ltm: "L: __TEXT_TO_SUMMARIZE__".into(),
        }
    }

    #[tokio::test]
    async fn summarizes_and_audits() {
        let dir = tempfile::tempdir().unwrap();
        let (events, mut rx) = EventEmitter::channel();
        let usage = UsageRecorder::new(UsageStats::default(), dir.path().join("config.json"), events.clone());
        let service = ScriptedService::new();
        service.push_text("  a summary \n");
        let prompts = prompts();
        let summarizer = TurnSummarizer {
            service: &service,
            prompts: &prompts,
            params: GenerationParams::default(),
            agent_name: "Wisp",
            user_name: "Ada",
            events: &events,
            usage: &usage,
        };

        let summary = summarizer.summarize(TierKind::Stm, "turn text").await;
        assert_eq!(summary.as_deref(), Some("a summary"));
        assert_eq!(service.prompts(), vec!["Summarize for Wisp:\nturn text"]);
        assert_eq!(usage.snapshot().api_requests, 1);
        assert_eq!(usage.snapshot().total_tokens, 15);

        assert_matches!(rx.try_recv(), Ok(EngineEvent::UpdateFullContext { tag: Some(t), .. }) if t == "summarizer_context");
        assert_matches!(rx.try_recv(), Ok(EngineEvent::UpdatePersistentStats(_)));
        assert_matches!(rx.try_recv(), Ok(EngineEvent::UpdatePersistentStats(_)));
        assert_matches!(
            rx.try_recv(),
            Ok(EngineEvent::NewMessage(NewMessage::Raw { tag, .. })) if tag == "summarizer_output"
        );
    }

    #[tokio::test]
    async fn no_summary_without_prompt_or_service() {
        let dir = tempfile::tempdir().unwrap();
        let (events, _rx) = EventEmitter::channel();
        let usage = UsageRecorder::new(UsageStats::default(), dir.path().join("config.json"), events.clone());
        let prompts = prompts();

        let ready = ScriptedService::new();
        let summarizer = TurnSummarizer {
            service: &ready,
            prompts: &prompts,
            params: GenerationParams::default(),
            agent_name: "Wisp",
            user_name: "Ada",
            events: &events,
            usage: &usage,
        };
        assert_eq!(summarizer.summarize(TierKind::Mtm, "x").await, None);
        assert_eq!(ready.calls(), 0);

        let offline = ScriptedService::not_ready();
        let summarizer = TurnSummarizer {
            service: &offline,
            ..summarizer
        };
        assert_eq!(summarizer.summarize(TierKind::Ltm, "x").await, None);
        assert_eq!(offline.calls(), 0);
        assert_eq!(usage.snapshot().api_requests, 0);
    }

    #[tokio::test]
    async fn failure_sentinels_never_become_memory() {
        let dir = tempfile::tempdir().unwrap();
        let (events, mut rx) = EventEmitter::channel();
        let usage = UsageRecorder::new(UsageStats::default(), dir.path().join("config.json"), events.clone());
        let service = ScriptedService::new();
        service.push_text(EMPTY_RESPONSE_SENTINEL);
        service.push_text(blocked_sentinel("SAFETY"));
        service.push_text("   ");
        let prompts = prompts();
        let summarizer = TurnSummarizer {
            service: &service,
            prompts: &prompts,
            params: GenerationParams::default(),
            agent_name: "Wisp",
            user_name: "Ada",
            events: &events,
            usage: &usage,
        };
        let mut memory = TieredMemory::load(dir.path().join("memory")).unwrap();
        let consolidator = MemoryConsolidator::default();

        for turn in 0..3 {
            let _ = consolidator
                .consolidate(&mut memory, &summarizer, &format!("turn {turn}"))
                .await;
        }

        assert!(memory.is_empty());
        assert!(TieredMemory::load(dir.path().join("memory")).unwrap().is_empty());
        assert_eq!(usage.snapshot().api_requests, 3);

        let mut audited = 0;
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::NewMessage(NewMessage::Raw { tag, .. }) = event {
                assert_eq!(tag, "summarizer_output");
                audited += 1;
            }
        }
        assert_eq!(audited, 3);
    }
}
