//! # wisp-terminal
//!
//! The agent's sandboxed file store.
//!
//! A flat directory of small text files. `.txt` files are entry-structured
//! (`{entry-N : body}` blocks with numbers that never repeat); files with any
//! other allowed extension are replaced whole on every push. Operations
//! return typed [`TerminalError`]s; turning them into model feedback is the
//! command interpreter's job.

#![deny(unsafe_code)]

pub mod entries;
pub mod errors;
pub mod marks;
pub mod policy;
pub mod terminal;

pub use entries::{EMPTY_MARKER, LEGACY_EMPTY_MARKER};
pub use errors::{Result, TerminalError};
pub use policy::{TerminalPolicy, is_valid_filename};
pub use terminal::{PushOutcome, VirtualTerminal};
