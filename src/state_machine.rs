//! Tutor conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions:
//! the runtime feeds events in, executes the returned effects, and feeds
//! completion results back in.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{CompletionPrompt, Effect};
pub use event::Event;
pub use state::TutorState;
pub use transition::{transition, TransitionError, TransitionResult};
