//! Conversation stage machine
//!
//! A closed set of stages plus the table of legal moves between them.

mod stage;
mod transition;

#[cfg(test)]
mod proptests;

pub use stage::Stage;
pub use transition::{allowed_targets, attempt_transition, can_transition, TransitionError};
