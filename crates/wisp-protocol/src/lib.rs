//! # wisp-protocol
//!
//! The brace command grammar the model answers in.
//!
//! - [`Grammar::extract`] tokenizes a response into [`Block`]s
//! - [`Grammar::validate`] applies the acceptance rules and yields a
//!   [`Validated`] response whose `sanitized` text keeps only the blocks
//! - [`Command`] is the closed set of recognized commands

#![deny(unsafe_code)]

pub mod command;
pub mod tokenizer;
pub mod validate;

pub use command::{Block, Command};
pub use tokenizer::{Grammar, sanitize};
pub use validate::{Validated, ValidationError};
