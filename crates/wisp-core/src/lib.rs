//! # wisp-core
//!
//! Foundation types shared by every Wisp crate:
//!
//! - **Events**: [`EngineEvent`], the outbound `{type, payload}` messages the
//!   engine sends to observers, plus the [`EventEmitter`] channel wrapper
//! - **Chat**: [`ChatLogEntry`] lines shared by the chat log and session snapshot
//! - **Usage**: [`UsageStats`] / [`TokenUsage`] cumulative counters
//! - **Presence**: [`UserStatus`] as reported by the front end
//! - **Memory vocabulary**: [`TierKind`] and [`MemorySnapshot`]
//! - **Logging**: [`logging::init_subscriber`] for the `tracing` stack

#![deny(unsafe_code)]

pub mod chat;
pub mod constants;
pub mod events;
pub mod logging;
pub mod memory;
pub mod presence;
pub mod usage;

pub use chat::ChatLogEntry;
pub use events::{EngineEvent, EventEmitter, NewMessage, StatusUpdate};
pub use memory::{MemorySnapshot, TierKind};
pub use presence::{ParseUserStatusError, UserStatus};
pub use usage::{TokenUsage, UsageStats};
