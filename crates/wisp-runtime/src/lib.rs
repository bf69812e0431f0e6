//! # wisp-runtime
//!
//! The turn engine and everything it drives.
//!
//! - **Engine**: owns session state, runs the trigger → generate → validate →
//!   apply → consolidate loop, pauses for speech playback
//! - **Assembler**: builds the system and dynamic prompt sections
//! - **Interpreter**: executes sandbox commands and renders their feedback
//! - **Control**: decodes front-end messages into ordered [`Mutation`]s
//! - **Speech**: background worker voicing utterances through a [`SpeechSink`]
//!
//! ## Crate Position
//!
//! Aggregation layer. Depends on: wisp-core, wisp-settings, wisp-llm,
//! wisp-protocol, wisp-terminal, wisp-memory.
//! Depended on by: wisp-agent.

#![deny(unsafe_code)]

pub mod assembler;
pub mod chat_log;
pub mod control;
pub mod engine;
pub mod errors;
pub mod interpreter;
pub mod speech;
pub mod state;
pub mod summarizer;
pub mod turn_state;
pub mod usage;

pub use assembler::{AssembledPrompt, PromptContext, assemble};
pub use chat_log::ChatLog;
pub use control::{ControlMessage, Mutation};
pub use engine::{Engine, MAX_RETRIES, TurnOutcome};
pub use errors::{ControlError, RuntimeError};
pub use interpreter::CommandInterpreter;
pub use speech::{SpeechError, SpeechHandle, SpeechSink, SpeechWorker};
pub use state::{EngineState, Transition};
pub use summarizer::TurnSummarizer;
pub use turn_state::TurnState;
pub use usage::UsageRecorder;
