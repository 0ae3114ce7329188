//! Step driver and limit switch trait seam.
//!
//! The motion engine and homing controller consume the hardware through
//! these two traits only. Whether pulses come from busy-wait pin toggling
//! or an offloaded pulse generator is a backend concern; implementations
//! differ only in achievable minimum pulse period and CPU occupancy during
//! emission. No pin numbering leaks through this boundary.

use quake_common::movement::Direction;

use crate::safety::stop::StopFlag;

/// One of the two end-of-travel switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitSide {
    /// Limit reached by backward travel.
    Back,
    /// Limit reached by forward travel.
    Front,
}

/// Emits step pulses toward the motor driver stage.
pub trait StepDriver: Send {
    /// Latch the travel direction for subsequent pulses.
    fn set_direction(&mut self, direction: Direction);

    /// Emit up to `count` pulses at `frequency_hz`, polling `stop` once per
    /// pulse. Returns the number of pulses actually emitted.
    ///
    /// A non-positive frequency or zero count emits nothing. A pulse in
    /// flight always completes before a newly set flag is observed.
    fn emit_pulses(&mut self, frequency_hz: f64, count: u32, stop: &StopFlag) -> u32;
}

/// Reads the two end-of-travel switches.
///
/// Edge notification is wired separately: the backend delivers
/// newly-asserted edges to `SafetyMonitor::on_limit_edge`.
pub trait LimitSwitches: Send + Sync {
    /// Current (level) state of one switch.
    fn is_asserted(&self, side: LimitSide) -> bool;
}
