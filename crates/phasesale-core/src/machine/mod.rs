//! # Machine Module
//!
//! Lazy phase evaluation.
//!
//! Transitions are a pure function of the current state, the schedule, the
//! terms and the time of the call. Nothing here reads a clock or touches a
//! collaborator; the engine decides when to evaluate and whether to commit.

mod transition;

pub use transition::*;
