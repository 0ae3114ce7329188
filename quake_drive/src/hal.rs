//! Hardware abstraction root.
//!
//! Pulse emission and limit sensing behind pluggable driver traits, plus a
//! simulation rig for development and testing without physical hardware.

pub mod driver;
pub mod sim;

pub use driver::{LimitSide, LimitSwitches, StepDriver};
