//! Motion module root.
//!
//! Trapezoidal velocity profile generation and execution.

pub mod profile;

pub use profile::{MotionEngine, MoveOutcome, PhaseReport};
