//! # wisp-llm
//!
//! The generation service contract used by the turn engine and the memory
//! consolidator, plus its Gemini implementation.
//!
//! - [`GenerationService`]: `generate(prompt, params) -> Generation`
//! - [`ServiceError`]: credentials and unavailability disable generation
//! - [`gemini::GeminiService`]: REST client for `generateContent`
//! - [`testing::ScriptedService`]: replay double for engine tests

#![deny(unsafe_code)]

pub mod gemini;
pub mod service;
pub mod testing;

pub use gemini::{GeminiConfig, GeminiService};
pub use service::{Generation, GenerationParams, GenerationService, ServiceError, ServiceResult};
