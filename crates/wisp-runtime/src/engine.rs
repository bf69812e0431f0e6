//! Turn engine.
//!
//! A single task owns all per-session state and runs the loop:
//!
//! 1. wait out speech playback while paused
//! 2. drain control messages and apply their mutations
//! 3. run a turn when a trigger fires
//! 4. publish the countdown and sleep one tick
//!
//! No two turns or generation calls overlap. Cancellation is observed between
//! iterations; an in-flight turn runs to completion.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use wisp_core::{
    ChatLogEntry, EngineEvent, EventEmitter, MemorySnapshot, NewMessage, StatusUpdate, TokenUsage,
    UserStatus,
};
use wisp_llm::gemini::is_failure_sentinel;
use wisp_llm::{GenerationParams, GenerationService};
use wisp_memory::{MemoryConsolidator, TieredMemory};
use wisp_protocol::{Grammar, Validated};
use wisp_settings::{
    DataPaths, PromptFiles, SettingsError, WispSettings, ensure_prompt_files, keys,
    save_settings_to_path, write_prompt_file,
};
use wisp_terminal::{TerminalPolicy, VirtualTerminal};

use crate::assembler::{AssembledPrompt, PromptContext, assemble};
use crate::chat_log::ChatLog;
use crate::control::{ControlMessage, Mutation};
use crate::errors::{ControlError, RuntimeError};
use crate::interpreter::CommandInterpreter;
use crate::speech::SpeechHandle;
use crate::state::{EngineState, Transition};
use crate::summarizer::TurnSummarizer;
use crate::turn_state::TurnState;
use crate::usage::UsageRecorder;

/// Generation attempts per turn.
pub const MAX_RETRIES: usize = 3;

const NOT_READY_MESSAGE: &str =
    "Cannot generate response. API key is missing, invalid, or could not be verified.";
const CRITICAL_MESSAGE: &str = "A critical error occurred in the turn engine.";

/// Sleep between loop iterations.
pub const TICK: Duration = Duration::from_millis(500);

/// Wait between failed generation attempts.
pub const RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// What a finished turn did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TurnOutcome {
    /// A response passed validation.
    pub succeeded: bool,
    /// Generation calls made for the turn itself (summaries excluded).
    pub attempts: usize,
    /// Utterances were handed to the speech worker.
    pub speaking: bool,
}

/// The turn engine.
pub struct Engine {
    settings: WispSettings,
    paths: DataPaths,
    prompts: PromptFiles,
    service: Arc<dyn GenerationService>,
    grammar: Grammar,
    terminal: VirtualTerminal,
    memory: TieredMemory,
    consolidator: MemoryConsolidator,
    chat_log: ChatLog,
    turn: TurnState,
    state: EngineState,
    events: EventEmitter,
    usage: UsageRecorder,
    speech: Option<SpeechHandle>,
    speech_pending: Option<oneshot::Receiver<()>>,
    unavailable_reported: bool,
}

impl Engine {
    /// Open the data directory and restore the previous session.
    ///
    /// Seeds missing prompt files, loads the sandbox and memory tiers, and
    /// emits the startup events (key status, system prompt, usage totals,
    /// memory, restored chat history).
    #[instrument(skip_all, fields(root = %paths.root().display()))]
    pub fn open(
        paths: DataPaths,
        settings: WispSettings,
        service: Arc<dyn GenerationService>,
        events: EventEmitter,
    ) -> Result<Self, RuntimeError> {
        paths.ensure_dirs()?;
        let seeded = ensure_prompt_files(&paths)?;
        if !seeded.is_empty() {
            info!(count = seeded.len(), "seeded default prompt files");
        }
        let prompts = PromptFiles::load(&paths)?;
        let terminal = VirtualTerminal::open(paths.terminal_dir(), terminal_policy(&settings))?;
        let memory = TieredMemory::load(paths.memory_dir())?;

        let self_prompts = if settings.has_history && !settings.last_self_prompt.is_empty() {
            settings.last_self_prompt.split('\n').map(str::to_string).collect()
        } else {
            initial_self_prompts(&settings)
        };
        let chat_log = if settings.has_history {
            ChatLog::with_entries(settings.chat_log_length, settings.chat_history.iter().cloned())
        } else {
            ChatLog::new(settings.chat_log_length)
        };
        let usage = UsageRecorder::new(
            settings.persistent_usage_stats,
            paths.config(),
            events.clone(),
        );

        let engine = Self {
            grammar: Grammar::new(&settings.agent_name),
            consolidator: MemoryConsolidator::new(settings.memory_capacities),
            turn: TurnState::new(self_prompts),
            state: EngineState::default(),
            speech: None,
            speech_pending: None,
            unavailable_reported: false,
            settings,
            paths,
            prompts,
            service,
            terminal,
            memory,
            chat_log,
            events,
            usage,
        };
        engine.announce();
        Ok(engine)
    }

    /// Voice utterances through `speech` while speech is enabled.
    pub fn set_speech(&mut self, speech: SpeechHandle) {
        self.speech = Some(speech);
    }

    fn announce(&self) {
        self.events
            .emit(EngineEvent::ApiKeyValidationStatus(self.service.is_ready()));
        self.events
            .emit(EngineEvent::SystemPromptLoaded(self.prompts.system_prompt.clone()));
        self.usage.publish();
        self.events.status(StatusUpdate::memory(self.memory.snapshot()));
        if self.settings.has_history && !self.chat_log.is_empty() {
            self.events
                .emit(EngineEvent::LoadChatHistory(self.chat_log.to_vec()));
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────

    /// Current settings.
    pub fn settings(&self) -> &WispSettings {
        &self.settings
    }

    /// Current state machine state.
    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Per-turn working state.
    pub fn turn(&self) -> &TurnState {
        &self.turn
    }

    /// Recent chat.
    pub fn chat_log(&self) -> &ChatLog {
        &self.chat_log
    }

    /// Memory tiers.
    pub fn memory(&self) -> MemorySnapshot {
        self.memory.snapshot()
    }

    /// The sandbox.
    pub fn terminal(&self) -> &VirtualTerminal {
        &self.terminal
    }

    /// Usage counters.
    pub fn usage(&self) -> &UsageRecorder {
        &self.usage
    }

    /// Loaded prompt texts.
    pub fn prompts(&self) -> &PromptFiles {
        &self.prompts
    }

    // ─────────────────────────────────────────────────────────────────────
    // Loop
    // ─────────────────────────────────────────────────────────────────────

    /// Run until `cancel` fires or an unexpected error occurs.
    ///
    /// The session snapshot is saved on the way out either way.
    #[instrument(skip_all, fields(agent = %self.settings.agent_name))]
    pub async fn run(
        &mut self,
        mut control: mpsc::UnboundedReceiver<ControlMessage>,
        cancel: CancellationToken,
    ) -> Result<(), RuntimeError> {
        info!("turn engine started");
        let result = loop {
            match self.iterate(&mut control, &cancel).await {
                Ok(true) => {}
                Ok(false) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        if let Err(e) = &result {
            error!(error = %e, category = e.category(), "turn engine failed");
            self.events.error(CRITICAL_MESSAGE);
        }
        if let Err(e) = self.save_config() {
            warn!(error = %e, "failed to save session");
        }
        info!("turn engine stopped");
        result
    }

    /// One loop iteration. Returns `false` once cancelled.
    async fn iterate(
        &mut self,
        control: &mut mpsc::UnboundedReceiver<ControlMessage>,
        cancel: &CancellationToken,
    ) -> Result<bool, RuntimeError> {
        if cancel.is_cancelled() {
            return Ok(false);
        }

        if let Some(done) = self.speech_pending.take() {
            self.events
                .status(StatusUpdate::timer("Self-prompting paused (speaking...)"));
            tokio::select! {
                () = cancel.cancelled() => return Ok(false),
                _ = done => {}
            }
            self.finish_speech()?;
            return Ok(true);
        }

        while let Ok(message) = control.try_recv() {
            self.handle_control(message).await;
        }

        if self.should_trigger() {
            let _ = self.execute_turn().await?;
        }

        if self.speech_pending.is_none() {
            self.events.status(StatusUpdate::timer(self.countdown_text()));
        }
        tokio::select! {
            () = cancel.cancelled() => Ok(false),
            () = tokio::time::sleep(TICK) => Ok(true),
        }
    }

    /// Whether a turn should start now.
    pub fn should_trigger(&self) -> bool {
        if self.state != EngineState::Idle {
            return false;
        }
        if self.turn.force_next_turn || !self.turn.pending_messages.is_empty() {
            return true;
        }
        self.settings.auto_turn_enabled
            && self.turn.idle_for() >= self.auto_turn_interval()
            && self.settings.user_status != UserStatus::Offline
            && !self.turn.user_typing
    }

    fn auto_turn_interval(&self) -> Duration {
        Duration::from_secs(self.settings.auto_turn_duration)
    }

    fn countdown_text(&self) -> String {
        if self.turn.user_typing {
            "Self-prompting paused (typing...)".to_string()
        } else if !self.settings.auto_turn_enabled {
            "Auto-turn is OFF".to_string()
        } else {
            let left = self.auto_turn_interval().saturating_sub(self.turn.idle_for());
            format!("Time until self prompt: {}s", left.as_secs())
        }
    }

    /// Leave the paused state after playback ended.
    pub fn finish_speech(&mut self) -> Result<(), RuntimeError> {
        self.state.apply(Transition::SpeechFinished)?;
        self.turn.touch();
        self.events.emit(EngineEvent::TtsPlaybackFinished);
        if std::mem::take(&mut self.turn.input_processed_after_speech) {
            self.events.emit(EngineEvent::UserInputProcessed);
        }
        debug!("speech finished");
        Ok(())
    }

    /// Receiver for the playback started by the last turn, if any.
    pub fn take_speech_pending(&mut self) -> Option<oneshot::Receiver<()>> {
        self.speech_pending.take()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Turn
    // ─────────────────────────────────────────────────────────────────────

    /// Run one turn.
    #[instrument(skip_all, fields(pending = self.turn.pending_messages.len()))]
    pub async fn execute_turn(&mut self) -> Result<TurnOutcome, RuntimeError> {
        self.turn.force_next_turn = false;
        let mut outcome = TurnOutcome::default();

        if !self.service.is_ready() {
            if !self.unavailable_reported {
                warn!("turn skipped: generation service not ready");
                self.events.error(NOT_READY_MESSAGE);
                self.unavailable_reported = true;
            }
            return Ok(outcome);
        }

        self.state.apply(Transition::Trigger)?;
        self.events.status(StatusUpdate::llm("Generating..."));

        let user_line = self.turn.user_line();
        if user_line.is_some() && self.settings.user_status != UserStatus::Online {
            self.settings.user_status = UserStatus::Online;
            self.events.emit(EngineEvent::SetUserStatus(UserStatus::Online));
        }

        let prompt = self.build_prompt();
        self.events.emit(EngineEvent::UpdateFullContext {
            full_context: prompt.full.clone(),
            tag: None,
        });
        self.events.emit(EngineEvent::LogInput {
            log_content: prompt.dynamic.clone(),
            tag: "input_log".to_string(),
        });

        let params = self.generation_params();
        let mut accepted = None;
        let mut disabled = false;
        for attempt in 1..=MAX_RETRIES {
            outcome.attempts = attempt;
            self.usage.record_request();
            match self.service.generate(&prompt.full, &params).await {
                Ok(generation) if is_failure_sentinel(&generation.text) => {
                    warn!(attempt, output = %generation.text.trim(), "generation returned no text");
                }
                Ok(generation) => {
                    let raw = generation.text.trim().to_string();
                    info!(attempt, raw = %raw, "raw model output");
                    match self.grammar.validate(&raw) {
                        Ok(validated) => {
                            accepted = Some((validated, raw, generation.usage));
                            break;
                        }
                        Err(reason) => warn!(attempt, %reason, "response validation failed"),
                    }
                }
                Err(e) if e.disables_generation() => {
                    warn!(attempt, error = %e, "generation disabled");
                    self.events.emit(EngineEvent::ApiKeyValidationStatus(false));
                    self.events.status(StatusUpdate::api(e.to_string()));
                    self.unavailable_reported = true;
                    disabled = true;
                    break;
                }
                Err(e) => warn!(attempt, error = %e, category = e.category(), "generation failed"),
            }
            if attempt < MAX_RETRIES {
                tokio::time::sleep(RETRY_BACKOFF).await;
            }
        }

        let mut speech_done = None;
        match accepted {
            Some((validated, raw, usage)) => {
                outcome.succeeded = true;
                speech_done = self.apply_response(&validated, &raw, usage.as_ref(), user_line.as_deref());
                outcome.speaking = speech_done.is_some();

                self.consolidate(&raw).await;

                if user_line.is_some() {
                    if outcome.speaking {
                        self.turn.input_processed_after_speech = true;
                    } else {
                        self.events.emit(EngineEvent::UserInputProcessed);
                    }
                }
            }
            // A disabled service was already reported through the API status.
            None if disabled => {}
            None => {
                self.events.emit(EngineEvent::LogGenerationFailure {
                    log_content: format!(
                        "--- API GENERATION FAILED ---\nFailed to get a valid response after {} attempts. The input for this turn will be retried on the next cycle.",
                        outcome.attempts
                    ),
                });
            }
        }

        if let Some(name) = self.turn.pending_read.take() {
            let interpreter = CommandInterpreter::new(
                &mut self.terminal,
                &self.settings.prompt_templates,
                &self.events,
            );
            if let Some(feedback) = interpreter.resolve_read(&name) {
                self.turn.push_feedback(&feedback);
            }
            self.turn.force_next_turn = true;
        }

        if !self.turn.force_next_turn && !outcome.speaking {
            self.turn.touch();
        }
        self.events.status(StatusUpdate::llm("Idle"));
        self.state.apply(Transition::TurnFinished)?;
        if let Some(done) = speech_done {
            self.state.apply(Transition::SpeechStarted)?;
            self.speech_pending = Some(done);
        }
        Ok(outcome)
    }

    fn build_prompt(&self) -> AssembledPrompt {
        let files = self.terminal.list().unwrap_or_else(|e| {
            warn!(error = %e, "could not list sandbox");
            Vec::new()
        });
        let memory = self.memory.snapshot();
        let chat_log = self.chat_log.render();
        assemble(&PromptContext {
            system_prompt: &self.prompts.system_prompt,
            memory: &memory,
            headers: &self.settings.memory_prompt_headers,
            chat_log: &chat_log,
            templates: &self.settings.prompt_templates,
            files: &files,
            input_injector: &self.prompts.input_injector,
            now: Local::now(),
            user_status: self.settings.user_status,
            self_prompts: &self.turn.self_prompts,
            feedback: &self.turn.feedback,
            pending_messages: &self.turn.pending_messages,
            agent_name: &self.settings.agent_name,
            user_name: &self.settings.user_name,
        })
    }

    fn generation_params(&self) -> GenerationParams {
        let p = &self.settings.llm_params;
        GenerationParams {
            temperature: p.temperature,
            top_k: p.top_k,
            top_p: p.top_p,
        }
    }

    /// Apply an accepted response. Returns the playback receiver when the
    /// utterances are being voiced.
    fn apply_response(
        &mut self,
        validated: &Validated,
        raw: &str,
        usage: Option<&TokenUsage>,
        user_line: Option<&str>,
    ) -> Option<oneshot::Receiver<()>> {
        if let Some(line) = user_line {
            self.chat_log
                .push(ChatLogEntry::new(self.settings.user_name.clone(), line));
            self.turn.pending_messages.clear();
        }
        self.turn.feedback.clear();
        if let Some(usage) = usage {
            self.usage.record_usage(usage);
        }

        let self_prompts = validated.self_prompts();
        self.turn.self_prompts = if self_prompts.is_empty() {
            vec![
                self.settings
                    .prompt_templates
                    .get(keys::FALLBACK_SELF_PROMPT)
                    .to_string(),
            ]
        } else {
            self_prompts
        };

        self.events.emit(EngineEvent::NewMessage(NewMessage::Raw {
            raw_log: raw.to_string(),
            usage: usage.copied(),
            tag: "output_log".to_string(),
        }));

        let utterances: Vec<String> = validated
            .utterances()
            .into_iter()
            .map(str::to_string)
            .collect();
        for text in &utterances {
            self.chat_log
                .push(ChatLogEntry::new(self.settings.agent_name.clone(), text.clone()));
            self.events.emit(EngineEvent::NewMessage(NewMessage::Chat {
                sanitized_message: text.clone(),
                chat_tag: "agent_chat".to_string(),
            }));
        }

        let speech_done = match &self.speech {
            Some(speech) if self.settings.tts_enabled && !utterances.is_empty() => {
                self.events.emit(EngineEvent::TtsPlaybackStarted);
                Some(speech.say(utterances.join(" "), self.settings.tts_voice_id.as_deref()))
            }
            _ => None,
        };

        CommandInterpreter::new(
            &mut self.terminal,
            &self.settings.prompt_templates,
            &self.events,
        )
        .run(validated.commands(), &mut self.turn);

        speech_done
    }

    async fn consolidate(&mut self, raw: &str) {
        let summarizer = TurnSummarizer {
            service: self.service.as_ref(),
            prompts: &self.prompts.summarizers,
            params: self.generation_params(),
            agent_name: &self.settings.agent_name,
            user_name: &self.settings.user_name,
            events: &self.events,
            usage: &self.usage,
        };
        let _ = self
            .consolidator
            .consolidate(&mut self.memory, &summarizer, raw)
            .await;
        self.events.status(StatusUpdate::memory(self.memory.snapshot()));
    }

    // ─────────────────────────────────────────────────────────────────────
    // Control
    // ─────────────────────────────────────────────────────────────────────

    /// Translate and apply one control message.
    ///
    /// Mutations apply in order; the first failure is reported and the rest
    /// of the message is dropped.
    pub async fn handle_control(&mut self, message: ControlMessage) {
        let mutations = match message.into_mutations(&self.settings) {
            Ok(mutations) => mutations,
            Err(e) => {
                warn!(error = %e, "control message rejected");
                self.events.error(e.to_string());
                return;
            }
        };
        for mutation in mutations {
            debug!(mutation = %mutation, "applying");
            if let Err(e) = self.apply(mutation).await {
                warn!(error = %e, "mutation failed");
                self.events.error(e.to_string());
                break;
            }
        }
    }

    async fn apply(&mut self, mutation: Mutation) -> Result<(), ControlError> {
        match mutation {
            Mutation::QueueUserMessage(text) => self.turn.pending_messages.push(text),
            Mutation::ReplaceApiKey(key) => self.replace_api_key(key).await,
            Mutation::SetAutoTurn(on) => {
                self.settings.auto_turn_enabled = on;
                self.turn.touch();
            }
            Mutation::SetSpeech(on) => self.settings.tts_enabled = on,
            Mutation::SetVoice(voice) => self.settings.tts_voice_id = voice,
            Mutation::SetUserStatus(status) => self.settings.user_status = status,
            Mutation::SetTyping(typing) => {
                if typing && !self.turn.user_typing {
                    self.turn.touch();
                }
                self.turn.user_typing = typing;
            }
            Mutation::HardReset => self.hard_reset()?,
            Mutation::ApplySettings(settings) => self.adopt_settings(*settings).await,
            Mutation::SendAllPrompts => self.events.emit(EngineEvent::AllPromptsData {
                system_prompt: self.prompts.system_prompt.clone(),
                input_injector: self.prompts.input_injector.clone(),
                prompt_templates: self.settings.prompt_templates.as_map().clone(),
            }),
            Mutation::SendSummarizerPrompts => {
                let s = &self.prompts.summarizers;
                self.events.emit(EngineEvent::SummarizerPromptsData {
                    stm: s.stm.clone(),
                    mtm: s.mtm.clone(),
                    ltm: s.ltm.clone(),
                });
            }
            Mutation::SetSystemPrompt(text) => {
                write_prompt_file(&self.paths.system_prompt(), &text)?;
                self.prompts.system_prompt = text;
            }
            Mutation::SetInputInjector(text) => {
                write_prompt_file(&self.paths.input_injector(), &text)?;
                self.prompts.input_injector = text;
            }
            Mutation::SetPromptTemplates(templates) => self.settings.prompt_templates = templates,
            Mutation::SetSummarizerPrompt(tier, text) => {
                write_prompt_file(&self.paths.summarizer(tier), &text)?;
                self.prompts.summarizers.set(tier, text);
            }
            Mutation::ResetTokenStats => self.usage.reset_tokens(),
            Mutation::ResetRequestCount => self.usage.reset_requests(),
            Mutation::SaveConfig => self.save_config()?,
            Mutation::Notify(text) => self.events.status(StatusUpdate::info(text)),
        }
        Ok(())
    }

    async fn replace_api_key(&mut self, key: String) {
        let ready = self.service.reconfigure(&key).await;
        info!(ready, "api key replaced");
        self.settings.api_key = key;
        self.events.emit(EngineEvent::ApiKeyValidationStatus(ready));
        if ready {
            self.unavailable_reported = false;
        }
    }

    async fn adopt_settings(&mut self, new: WispSettings) {
        let key_changed = new.api_key != self.settings.api_key;
        if new.agent_name != self.settings.agent_name {
            info!(from = %self.settings.agent_name, to = %new.agent_name, "agent renamed");
            self.grammar = Grammar::new(&new.agent_name);
        }
        self.chat_log.set_capacity(new.chat_log_length);
        self.terminal.set_policy(terminal_policy(&new));
        self.consolidator.set_capacities(new.memory_capacities);
        self.settings = WispSettings {
            persistent_usage_stats: self.usage.snapshot(),
            ..new
        };
        if key_changed {
            let key = self.settings.api_key.clone();
            self.replace_api_key(key).await;
        }
    }

    /// Wipe the session back to a first start.
    ///
    /// Sandbox files keep their names with `[empty]` content; memory tiers
    /// and chat history are cleared; auto-turn is switched off.
    #[instrument(skip_all)]
    pub fn hard_reset(&mut self) -> Result<(), ControlError> {
        warn!("hard reset");
        self.chat_log.clear();
        self.turn = TurnState::new(initial_self_prompts(&self.settings));
        self.settings.auto_turn_enabled = false;
        if let Err(e) = self.terminal.wipe() {
            error!(error = %e, "failed to wipe sandbox");
        }
        if let Err(e) = self.memory.wipe() {
            error!(error = %e, "failed to wipe memory");
        }
        self.save_config()?;

        self.events.emit(EngineEvent::ClearAllUiLogs);
        self.events.emit(EngineEvent::SetAutoTurnState(false));
        self.events.status(StatusUpdate::info(format!(
            "{} has been reset.",
            self.settings.agent_name
        )));
        self.events.status(StatusUpdate::memory(self.memory.snapshot()));
        Ok(())
    }

    /// Write `config.json` with the current session snapshot.
    pub fn save_config(&mut self) -> Result<(), SettingsError> {
        self.settings.persistent_usage_stats = self.usage.snapshot();
        self.settings.has_history = !self.chat_log.is_empty();
        self.settings.last_self_prompt = self.turn.self_prompts.join("\n");
        self.settings.chat_history = self.chat_log.to_vec();
        save_settings_to_path(&self.settings, &self.paths.config())
    }
}

fn initial_self_prompts(settings: &WispSettings) -> Vec<String> {
    vec![
        settings
            .prompt_templates
            .get(keys::INITIAL_SELF_PROMPT)
            .to_string(),
    ]
}

fn terminal_policy(settings: &WispSettings) -> TerminalPolicy {
    TerminalPolicy {
        max_file_chars: settings.max_file_char_count,
        max_files: settings.max_terminal_files,
        allowed_extensions: settings
            .allowed_file_extensions
            .iter()
            .map(|ext| ext.to_lowercase())
            .collect(),
    }
}

