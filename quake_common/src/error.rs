//! Motion profile error taxonomy.
//!
//! Nothing here is fatal to the process: every failure is returned to the
//! caller as a typed value and the system stays ready for the next command.

use thiserror::Error;

/// A movement request that cannot be executed as a feasible profile.
///
/// Infeasible requests are rejected before any pulse is emitted; there is
/// no partial motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProfileError {
    /// The requested step count is too short to fit a full
    /// accelerate/decelerate cycle at the requested speed and acceleration.
    #[error(
        "infeasible profile: {required} ramp steps (both phases) exceed the {available} requested"
    )]
    Infeasible {
        /// Steps consumed by the acceleration and deceleration ramps combined.
        required: i64,
        /// Steps requested for the whole movement.
        available: i64,
    },
    /// A ramp was requested with zero acceleration; the ramp-time formula
    /// would divide by zero.
    #[error("infeasible profile: ramped movement with zero acceleration")]
    ZeroAcceleration,
    /// The requested target speed exceeds what the driver stage accepts.
    #[error("infeasible profile: target speed {requested} Hz above the {limit} Hz limit")]
    SpeedAboveLimit {
        /// Target speed of the rejected request [steps/s].
        requested: u32,
        /// Configured driver speed limit [steps/s].
        limit: u32,
    },
}
