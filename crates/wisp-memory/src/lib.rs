//! # wisp-memory
//!
//! Tiered memory for the Wisp agent.
//!
//! - [`TieredMemory`]: STM/MTM/LTM entry lists persisted as JSON
//! - [`MemoryConsolidator`]: folds full tiers upward through a [`Summarizer`]

#![deny(unsafe_code)]

pub mod consolidator;
pub mod errors;
pub mod store;

pub use consolidator::{ConsolidationReport, MemoryConsolidator, Summarizer, batch_size};
pub use errors::{MemoryError, Result};
pub use store::{TieredMemory, bullet_lines};
