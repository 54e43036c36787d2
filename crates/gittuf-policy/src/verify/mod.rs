//! Change verification: checking protected references against policy.
//!
//! Verification checks:
//! 1. Current state: the recorded tip of a target matches the live
//!    reference, in both the current and the last-trusted policy
//! 2. Transitions: every path changed between two recorded tips was
//!    signed for by keys the older policy allows for that path

pub mod current;
pub mod target;
pub mod transition;

pub use current::verify_current_state;
pub use target::Target;
pub use transition::{verify_transition, TransitionVerification};
