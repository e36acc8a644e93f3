//! Gesture module - pen state machine and two-hand presence
//!
//! Re-exports only. All logic in submodules.

mod pen;
mod two_hand;

pub use pen::{PenEvent, PenInput, PenPhase, PenState, PenStateMachine};
pub use two_hand::{TwoHandDetector, TwoHandState};
