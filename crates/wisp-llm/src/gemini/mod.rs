//! Google Gemini backend.

pub mod client;
pub mod types;

pub use client::{
    EMPTY_RESPONSE_SENTINEL, GeminiConfig, GeminiService, blocked_sentinel, is_failure_sentinel,
};
pub use types::{DEFAULT_BASE_URL, STOP_SEQUENCES};
