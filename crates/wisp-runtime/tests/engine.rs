//! End-to-end turn scenarios against a scripted generation service.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wisp_core::{EngineEvent, EventEmitter, NewMessage, StatusUpdate, UserStatus};
use wisp_llm::ServiceError;
use wisp_llm::gemini::{EMPTY_RESPONSE_SENTINEL, blocked_sentinel};
use wisp_llm::testing::ScriptedService;
use wisp_runtime::{
    ControlMessage, Engine, EngineState, SpeechError, SpeechSink, SpeechWorker,
};
use wisp_settings::{DataPaths, MemoryCapacities, WispSettings, load_settings};

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

struct Harness {
    dir: TempDir,
    engine: Engine,
    service: Arc<ScriptedService>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
}

impl Harness {
    fn new(settings: WispSettings) -> Self {
        Self::with_setup(settings, ScriptedService::new(), |_| {})
    }

    fn with_setup(
        settings: WispSettings,
        service: ScriptedService,
        setup: impl FnOnce(&DataPaths),
    ) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path());
        paths.ensure_dirs().unwrap();
        setup(&paths);
        let service = Arc::new(service);
        let (emitter, events) = EventEmitter::channel();
        let engine = Engine::open(paths, settings, service.clone(), emitter).unwrap();
        Self {
            dir,
            engine,
            service,
            events,
        }
    }

    fn paths(&self) -> DataPaths {
        DataPaths::new(self.dir.path())
    }

    fn drain(&mut self) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Queue a valid turn reply followed by the STM summary for it.
    fn script_turn(&self, extra: &str, summary: &str) {
        self.service.push_text(reply(extra));
        self.service.push_text(summary);
    }

    fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.paths().terminal_dir().join(name)).unwrap()
    }
}

fn settings() -> WispSettings {
    WispSettings {
        agent_name: "Wisp".into(),
        user_name: "Ada".into(),
        ..WispSettings::default()
    }
}

fn reply(extra: &str) -> String {
    format!("{{thinking: considering}}{{self-prompt-from-Wisp: keep going}}{extra}")
}

fn count(events: &[EngineEvent], pred: impl Fn(&EngineEvent) -> bool) -> usize {
    events.iter().filter(|e| pred(e)).count()
}

fn info_lines(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StatusUpdate(StatusUpdate { info: Some(text), .. }) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Startup
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn startup_announces_state_and_seeds_prompts() {
    let mut h = Harness::new(settings());
    let events = h.drain();

    assert_matches!(events[0], EngineEvent::ApiKeyValidationStatus(true));
    assert_matches!(&events[1], EngineEvent::SystemPromptLoaded(text) if !text.is_empty());
    assert_matches!(events[2], EngineEvent::UpdatePersistentStats(_));
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::LoadChatHistory(_))), 0);
    assert!(h.paths().system_prompt().exists());
    assert_eq!(h.engine.state(), EngineState::Idle);
    assert!(h.engine.turn().self_prompts[0].contains("i have awoken"));
}

#[tokio::test]
async fn first_prompt_carries_initial_self_prompt_and_names() {
    let mut h = Harness::new(settings());
    h.script_turn("", "");
    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(outcome.succeeded);

    let prompts = h.service.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains("{self-prompt-from-Wisp: i have awoken"));
    assert!(prompt.ends_with("{Wisp-starts-thinking}"));
    assert!(!prompt.contains("{NAME}"));
    assert_eq!(h.engine.turn().self_prompts, vec!["{self-prompt-from-Wisp: keep going}"]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation and retries
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_turn_preserves_pending_input() {
    let mut h = Harness::new(settings());
    h.engine
        .handle_control(ControlMessage::UserMessage("hello".into()))
        .await;
    h.service.push_text("");
    h.service.push_text("{thinking: only thoughts}");
    h.service.push_text("no blocks at all");

    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(!outcome.succeeded);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(h.engine.turn().pending_messages, vec!["hello"]);
    assert!(h.engine.chat_log().is_empty());
    assert!(h.engine.turn().self_prompts[0].contains("i have awoken"));
    assert_eq!(h.engine.usage().snapshot().api_requests, 3);
    assert_eq!(h.engine.state(), EngineState::Idle);

    let events = h.drain();
    assert_eq!(
        count(&events, |e| matches!(e, EngineEvent::LogGenerationFailure { log_content } if log_content.contains("after 3 attempts"))),
        1
    );
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::UserInputProcessed)), 0);

    // The same input goes out again on the next turn and is consumed.
    h.script_turn("{Wisp-says: hi Ada}", "greeted the user");
    assert!(h.engine.should_trigger());
    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(outcome.succeeded);
    assert!(h.service.prompts()[3].contains("{Ada-says: hello}"));
    assert!(h.engine.turn().pending_messages.is_empty());
    let lines: Vec<String> = h.engine.chat_log().iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec!["Ada: hello", "Wisp: hi Ada"]);
    assert_eq!(h.engine.memory().stm, vec!["greeted the user"]);

    let events = h.drain();
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::UserInputProcessed)), 1);
    assert_eq!(
        count(&events, |e| matches!(e, EngineEvent::NewMessage(NewMessage::Chat { sanitized_message, .. }) if sanitized_message == "hi Ada")),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn user_input_brings_user_online() {
    let mut h = Harness::new(WispSettings {
        user_status: UserStatus::Away,
        ..settings()
    });
    h.engine
        .handle_control(ControlMessage::UserMessage("back".into()))
        .await;
    h.script_turn("", "");
    let _ = h.engine.execute_turn().await.unwrap();
    assert_eq!(h.engine.settings().user_status, UserStatus::Online);
    assert!(h.service.prompts()[0].contains("status-is-currently : online"));
    assert_eq!(
        count(&h.drain(), |e| matches!(e, EngineEvent::SetUserStatus(UserStatus::Online))),
        1
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Service availability
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unready_service_keeps_input_and_reports_once() {
    let mut h = Harness::with_setup(settings(), ScriptedService::not_ready(), |_| {});
    let _ = h.drain();
    h.engine
        .handle_control(ControlMessage::UserMessage("anyone?".into()))
        .await;

    for _ in 0..3 {
        let outcome = h.engine.execute_turn().await.unwrap();
        assert_eq!(outcome.attempts, 0);
    }
    assert_eq!(h.service.calls(), 0);
    assert_eq!(h.engine.turn().pending_messages, vec!["anyone?"]);
    let events = h.drain();
    assert_eq!(
        count(&events, |e| matches!(e, EngineEvent::Error(m) if m.starts_with("Cannot generate response"))),
        1
    );

    h.engine
        .handle_control(ControlMessage::UpdateApiKey("key".into()))
        .await;
    assert_matches!(h.drain()[0], EngineEvent::ApiKeyValidationStatus(true));
    assert_eq!(load_settings(&h.paths()).unwrap().api_key, "key");

    h.script_turn("", "");
    assert!(h.engine.execute_turn().await.unwrap().succeeded);
    assert!(h.engine.turn().pending_messages.is_empty());
}

#[tokio::test(start_paused = true)]
async fn rejected_credentials_stop_retries() {
    let mut h = Harness::new(settings());
    let _ = h.drain();
    h.service.push_error(ServiceError::Credentials {
        message: "API key not valid".into(),
    });

    let outcome = h.engine.execute_turn().await.unwrap();
    assert_eq!(outcome.attempts, 1);
    assert!(!outcome.succeeded);

    let events = h.drain();
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::ApiKeyValidationStatus(false))), 1);
    assert_eq!(
        count(&events, |e| matches!(e, EngineEvent::StatusUpdate(StatusUpdate { api_status: Some(_), .. }))),
        1
    );
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::LogGenerationFailure { .. })), 0);

    // Already reported; the next turn is skipped silently.
    let _ = h.engine.execute_turn().await.unwrap();
    assert_eq!(count(&h.drain(), |e| matches!(e, EngineEvent::Error(_))), 0);
}

#[tokio::test(start_paused = true)]
async fn failure_sentinels_are_retried_and_never_stored() {
    let mut h = Harness::new(settings());
    h.service.push_text(EMPTY_RESPONSE_SENTINEL);
    h.service.push_text(blocked_sentinel("SAFETY"));
    h.service.push_text(EMPTY_RESPONSE_SENTINEL);

    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(!outcome.succeeded);
    assert_eq!(outcome.attempts, 3);
    assert!(h.engine.memory().stm.is_empty());
    assert!(h.engine.turn().self_prompts[0].contains("i have awoken"));

    // A transient failure followed by a good reply; the summary slot fails too.
    h.service.push_text(EMPTY_RESPONSE_SENTINEL);
    h.service.push_text(reply(""));
    h.service.push_text(EMPTY_RESPONSE_SENTINEL);
    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 2);
    assert!(h.engine.memory().stm.is_empty());
    assert!(h.engine.chat_log().is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Sandbox commands
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn capacity_exceeded_push_reports_content() {
    let settings = WispSettings {
        max_file_char_count: 40,
        ..settings()
    };
    let mut h = Harness::with_setup(settings, ScriptedService::new(), |paths| {
        std::fs::write(paths.terminal_dir().join("notes.txt"), "{entry-1 : first entry body here}")
            .unwrap();
    });

    h.script_turn("{push-update-notes.txt: another long entry}", "");
    let _ = h.engine.execute_turn().await.unwrap();

    assert_eq!(h.read_file("notes.txt"), "{entry-1 : first entry body here}");
    let turn = h.engine.turn();
    assert!(turn.force_next_turn);
    assert!(turn.feedback.contains("file-update-failed-capacity-exceeded"));
    assert!(turn.feedback.contains("The current content is: {entry-1 : first entry body here}"));
    assert!(h.engine.should_trigger());

    h.script_turn("{notes.txt-entry-1-delete}", "");
    let _ = h.engine.execute_turn().await.unwrap();
    let prompts = h.service.prompts();
    assert!(prompts[2].contains("file-update-failed-capacity-exceeded"));
    assert_eq!(h.read_file("notes.txt"), "[empty]");
    assert!(h.engine.turn().feedback.contains("deleted-entry[1-from-notes.txt]"));
    let _ = h.drain();
}

#[tokio::test(start_paused = true)]
async fn entry_numbers_survive_deletion() {
    let mut h = Harness::new(settings());
    h.script_turn(
        "{create-file-log.txt}{push-update-log.txt: one}{push-update-log.txt: two}",
        "",
    );
    let _ = h.engine.execute_turn().await.unwrap();
    h.script_turn("{log.txt-entry-2-delete}{push-update-log.txt: three}", "");
    let _ = h.engine.execute_turn().await.unwrap();

    assert_eq!(h.read_file("log.txt"), "{entry-1 : one}\n{entry-3 : three}");
    assert!(h.engine.turn().feedback.contains("appended-to-file[log.txt[entry-3]]"));
}

#[tokio::test(start_paused = true)]
async fn read_file_forces_next_turn_with_content() {
    let mut h = Harness::with_setup(settings(), ScriptedService::new(), |paths| {
        std::fs::write(paths.terminal_dir().join("notes.txt"), "{entry-1 : remember milk}").unwrap();
    });

    h.script_turn("{read-file-notes.txt}", "");
    let _ = h.engine.execute_turn().await.unwrap();
    assert!(h.engine.turn().force_next_turn);
    assert!(h.engine.turn().pending_read.is_none());
    assert!(
        h.engine
            .turn()
            .feedback
            .contains("{{notes.txt[CURRENT-CONTENT: {entry-1 : remember milk}]}")
    );
    assert!(!h.engine.settings().auto_turn_enabled);
    assert!(h.engine.should_trigger());

    h.script_turn("", "");
    let _ = h.engine.execute_turn().await.unwrap();
    assert!(h.service.prompts()[2].contains("CURRENT-CONTENT: {entry-1 : remember milk}"));
    assert!(!h.engine.turn().force_next_turn);
    assert!(h.engine.turn().feedback.is_empty());
}

#[tokio::test(start_paused = true)]
async fn ping_user_is_forwarded() {
    let mut h = Harness::new(settings());
    let _ = h.drain();
    h.script_turn("{ping-user}", "");
    let _ = h.engine.execute_turn().await.unwrap();
    assert_eq!(count(&h.drain(), |e| matches!(e, EngineEvent::PingUser)), 1);
    assert!(!h.engine.turn().force_next_turn);
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn sixth_summary_folds_oldest_half_into_mtm() {
    let mut h = Harness::new(WispSettings {
        memory_capacities: MemoryCapacities {
            stm: 6,
            mtm: 6,
            ltm: 6,
        },
        ..settings()
    });

    for i in 1..=6 {
        h.script_turn("", &format!("s{i}"));
        if i == 6 {
            h.service.push_text("m1");
        }
        assert!(h.engine.execute_turn().await.unwrap().succeeded);
    }

    let memory = h.engine.memory();
    assert_eq!(memory.stm, vec!["s4", "s5", "s6"]);
    assert_eq!(memory.mtm, vec!["m1"]);
    assert!(memory.ltm.is_empty());
    assert_eq!(h.service.remaining(), 0);

    let prompts = h.service.prompts();
    assert!(prompts.last().unwrap().contains("- s1\n- s2\n- s3"));

    let events = h.drain();
    assert!(count(&events, |e| matches!(e, EngineEvent::UpdateFullContext { tag: Some(t), .. } if t == "summarizer_context")) >= 7);

    // Memory reaches the next prompt, long-term tiers first.
    h.script_turn("", "");
    let _ = h.engine.execute_turn().await.unwrap();
    let prompt = h.service.prompts()[13].clone();
    let mtm_at = prompt.find("- m1").unwrap();
    let stm_at = prompt.find("- s4").unwrap();
    assert!(mtm_at < stm_at);
}

// ─────────────────────────────────────────────────────────────────────────────
// Speech
// ─────────────────────────────────────────────────────────────────────────────

struct SlowSink;

#[async_trait]
impl SpeechSink for SlowSink {
    async fn speak(&self, _text: &str, _voice: Option<&str>) -> Result<(), SpeechError> {
        tokio::time::sleep(Duration::from_secs(3)).await;
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn speaking_pauses_and_defers_input_processed() {
    let cancel = CancellationToken::new();
    let (speech, _task) = SpeechWorker::spawn(Arc::new(SlowSink), cancel.clone());
    let mut h = Harness::new(WispSettings {
        tts_enabled: true,
        ..settings()
    });
    h.engine.set_speech(speech);
    let _ = h.drain();

    h.engine
        .handle_control(ControlMessage::UserMessage("say something".into()))
        .await;
    h.script_turn("{Wisp-says: first}{Wisp-says: second}", "");
    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(outcome.speaking);
    assert_eq!(h.engine.state(), EngineState::Paused);
    assert!(!h.engine.should_trigger());

    let events = h.drain();
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::TtsPlaybackStarted)), 1);
    assert_eq!(count(&events, |e| matches!(e, EngineEvent::UserInputProcessed)), 0);

    let done = h.engine.take_speech_pending().unwrap();
    done.await.unwrap();
    h.engine.finish_speech().unwrap();
    assert_eq!(h.engine.state(), EngineState::Idle);

    let events = h.drain();
    assert_matches!(events[0], EngineEvent::TtsPlaybackFinished);
    assert_matches!(events[1], EngineEvent::UserInputProcessed);
    cancel.cancel();
}

// ─────────────────────────────────────────────────────────────────────────────
// Control
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn auto_turn_respects_typing_and_presence() {
    let mut h = Harness::new(WispSettings {
        auto_turn_enabled: true,
        auto_turn_duration: 60,
        ..settings()
    });
    assert!(!h.engine.should_trigger());
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(h.engine.should_trigger());

    h.engine
        .handle_control(ControlMessage::UpdateUserStatus(UserStatus::Offline))
        .await;
    assert!(!h.engine.should_trigger());
    h.engine
        .handle_control(ControlMessage::UpdateUserStatus(UserStatus::Busy))
        .await;
    assert!(h.engine.should_trigger());

    h.engine
        .handle_control(ControlMessage::UserTypingStatus(true))
        .await;
    assert!(!h.engine.should_trigger());
    h.engine
        .handle_control(ControlMessage::UserTypingStatus(false))
        .await;
    assert!(!h.engine.should_trigger(), "typing restarted the timer");

    h.engine
        .handle_control(ControlMessage::UpdateAutoTurnState(false))
        .await;
    tokio::time::advance(Duration::from_secs(120)).await;
    assert!(!h.engine.should_trigger());
}

#[tokio::test(start_paused = true)]
async fn renaming_the_agent_rebuilds_the_grammar() {
    let mut h = Harness::new(settings());
    let patch = json!({"agent_name": "Nova", "chat_log_length": 2});
    h.engine
        .handle_control(ControlMessage::SaveAllSettings(patch.as_object().unwrap().clone()))
        .await;
    assert_eq!(h.engine.settings().agent_name, "Nova");
    assert_eq!(h.engine.chat_log().capacity(), 2);
    assert!(info_lines(&h.drain()).contains(&"Settings saved.".to_string()));
    assert_eq!(load_settings(&h.paths()).unwrap().agent_name, "Nova");

    h.service.push_text("{thinking: t}{self-prompt-from-Wisp: old name}");
    h.service.push_text("{thinking: t}{self-prompt-from-Nova: new name}");
    h.service.push_text("");
    let outcome = h.engine.execute_turn().await.unwrap();
    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts, 2);
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let mut h = Harness::new(settings());
    let _ = h.drain();
    let patch = json!({"memory_capacities": {"stm": 0}});
    h.engine
        .handle_control(ControlMessage::SaveAllSettings(patch.as_object().unwrap().clone()))
        .await;
    let events = h.drain();
    assert_matches!(&events[..], [EngineEvent::Error(msg)] if msg.starts_with("Invalid settings"));
    assert_eq!(h.engine.settings().memory_capacities.stm, 6);
}

#[tokio::test]
async fn prompt_edits_persist() {
    let mut h = Harness::new(settings());
    let _ = h.drain();
    h.engine
        .handle_control(ControlMessage::SaveMainPrompt {
            system_prompt: Some("You are {NAME}, a small light.".into()),
        })
        .await;
    h.engine
        .handle_control(ControlMessage::SaveSummarizerPrompts {
            stm: Some("Condense: __TEXT_TO_SUMMARIZE__".into()),
            mtm: None,
            ltm: None,
        })
        .await;
    h.engine.handle_control(ControlMessage::GetAllPrompts).await;
    h.engine
        .handle_control(ControlMessage::GetSummarizerPrompts)
        .await;

    let paths = h.paths();
    assert_eq!(
        std::fs::read_to_string(paths.system_prompt()).unwrap(),
        "You are {NAME}, a small light."
    );
    let events = h.drain();
    assert_eq!(
        info_lines(&events),
        vec!["Main prompt saved.", "Summarizer prompts saved."]
    );
    assert_matches!(&events[2], EngineEvent::AllPromptsData { system_prompt, .. } if system_prompt.starts_with("You are {NAME}"));
    assert_matches!(&events[3], EngineEvent::SummarizerPromptsData { stm, .. } if stm == "Condense: __TEXT_TO_SUMMARIZE__");
}

#[tokio::test]
async fn stat_resets() {
    let mut h = Harness::new(WispSettings {
        persistent_usage_stats: wisp_core::UsageStats {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
            api_requests: 4,
        },
        ..settings()
    });
    h.engine
        .handle_control(ControlMessage::ResetPersistentStats)
        .await;
    let stats = h.engine.usage().snapshot();
    assert_eq!((stats.total_tokens, stats.api_requests), (0, 4));
    h.engine
        .handle_control(ControlMessage::ResetApiRequests)
        .await;
    assert_eq!(h.engine.usage().snapshot().api_requests, 0);
    let lines = info_lines(&h.drain());
    assert_eq!(
        lines,
        vec!["Persistent token stats reset.", "API request counter reset."]
    );
}

#[tokio::test(start_paused = true)]
async fn hard_reset_wipes_session() {
    let mut h = Harness::new(WispSettings {
        auto_turn_enabled: true,
        ..settings()
    });
    h.engine
        .handle_control(ControlMessage::UserMessage("hi".into()))
        .await;
    h.script_turn("{create-file-a.txt}{push-update-a.txt: kept?}", "a memory");
    let _ = h.engine.execute_turn().await.unwrap();
    assert!(!h.engine.chat_log().is_empty());
    let _ = h.drain();

    h.engine.handle_control(ControlMessage::HardReset).await;

    assert!(h.engine.chat_log().is_empty());
    assert!(h.engine.memory().stm.is_empty());
    assert_eq!(h.read_file("a.txt"), "[empty]");
    assert!(!h.engine.settings().auto_turn_enabled);
    assert!(h.engine.turn().self_prompts[0].contains("i have awoken"));
    assert!(h.engine.turn().feedback.is_empty());

    let events = h.drain();
    assert_matches!(events[0], EngineEvent::ClearAllUiLogs);
    assert_matches!(events[1], EngineEvent::SetAutoTurnState(false));
    assert_eq!(info_lines(&events), vec!["Wisp has been reset."]);

    let saved = load_settings(&h.paths()).unwrap();
    assert!(!saved.has_history);
    assert!(saved.chat_history.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Loop
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn loop_runs_turns_and_restores_session() {
    let Harness {
        dir,
        mut engine,
        service,
        mut events,
    } = Harness::new(settings());
    service.push_text(reply("{Wisp-says: hello there}"));
    service.push_text("met the user");

    let (control, control_rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();
    let task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let result = engine.run(control_rx, cancel).await;
            (engine, result)
        })
    };

    control
        .send(ControlMessage::UserMessage("hi".into()))
        .unwrap();
    loop {
        match events.recv().await {
            Some(EngineEvent::UserInputProcessed) => break,
            Some(_) => {}
            None => panic!("engine stopped early"),
        }
    }
    // The countdown keeps ticking while idle.
    loop {
        if let Some(EngineEvent::StatusUpdate(StatusUpdate { turn_timer: Some(t), .. })) =
            events.recv().await
        {
            assert_eq!(t, "Auto-turn is OFF");
            break;
        }
    }
    cancel.cancel();
    let (engine, result) = task.await.unwrap();
    result.unwrap();
    assert_eq!(engine.memory().stm, vec!["met the user"]);

    let paths = DataPaths::new(dir.path());
    let saved = load_settings(&paths).unwrap();
    assert!(saved.has_history);
    assert_eq!(saved.chat_history.len(), 2);
    assert_eq!(saved.last_self_prompt, "{self-prompt-from-Wisp: keep going}");
    assert_eq!(saved.persistent_usage_stats.api_requests, 2);

    let (emitter, mut rx) = EventEmitter::channel();
    let restored = Engine::open(paths, saved, Arc::new(ScriptedService::new()), emitter).unwrap();
    assert_eq!(restored.turn().self_prompts, vec!["{self-prompt-from-Wisp: keep going}"]);
    assert_eq!(restored.memory().stm, vec!["met the user"]);
    let mut history = None;
    while let Ok(event) = rx.try_recv() {
        if let EngineEvent::LoadChatHistory(entries) = event {
            history = Some(entries);
        }
    }
    let history = history.unwrap();
    assert_eq!(history[0].to_string(), "Ada: hi");
    assert_eq!(history[1].to_string(), "Wisp: hello there");
}
