//! Engine state machine.
//!
//! ```text
//!            trigger                 turn finished
//!   Idle ───────────────▶ Generating ───────────────▶ Idle
//!    │                        │
//!    │ speech started         │ speech started
//!    ▼                        ▼
//!  Paused ◀───────────────────┘
//!    │ speech finished
//!    ▼
//!   Idle
//! ```

use crate::errors::RuntimeError;

/// Where the engine is in its cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineState {
    /// Waiting for a trigger.
    #[default]
    Idle,
    /// A turn is running.
    Generating,
    /// Speech playback is in progress; triggers are not evaluated.
    Paused,
}

/// Input to the state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A turn is starting.
    Trigger,
    /// The turn ended, successfully or after exhausting its attempts.
    TurnFinished,
    /// An utterance was handed to the speech worker.
    SpeechStarted,
    /// The speech worker signalled completion.
    SpeechFinished,
}

impl EngineState {
    /// The state after `transition`, or an error if the pair is not legal.
    pub fn next(self, transition: Transition) -> Result<Self, RuntimeError> {
        use EngineState::{Generating, Idle, Paused};
        use Transition::{SpeechFinished, SpeechStarted, TurnFinished, Trigger};

        match (self, transition) {
            (Idle, Trigger) => Ok(Generating),
            (Generating, TurnFinished) | (Paused, SpeechFinished) => Ok(Idle),
            (Idle | Generating, SpeechStarted) => Ok(Paused),
            (from, transition) => Err(RuntimeError::IllegalTransition { from, transition }),
        }
    }

    /// Apply `transition` in place.
    pub fn apply(&mut self, transition: Transition) -> Result<(), RuntimeError> {
        *self = self.next(transition)?;
        Ok(())
    }
}
