//! Movement value types.
//!
//! A `Movement` describes one bounded motion request: target pulse rate,
//! acceleration, total pulse count and travel direction. Values are
//! immutable once constructed and copied into the command channel.

use serde::{Deserialize, Serialize};

/// Travel direction of the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Toward the back limit switch.
    Backward = 0,
    /// Toward the front limit switch.
    Forward = 1,
}

impl Direction {
    /// Decode from the wire representation (`0` = backward, `1` = forward).
    #[inline]
    pub const fn from_bit(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Backward),
            1 => Some(Self::Forward),
            _ => None,
        }
    }

    /// Wire representation.
    #[inline]
    pub const fn bit(&self) -> u8 {
        *self as u8
    }

    /// The opposite direction.
    #[inline]
    pub const fn reversed(&self) -> Self {
        match self {
            Self::Backward => Self::Forward,
            Self::Forward => Self::Backward,
        }
    }
}

/// One bounded motion request.
///
/// `acceleration == 0` means "constant speed, no ramp". A negative
/// `step_count` is treated as zero pulses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Target pulse rate [steps/s].
    pub target_speed: u32,
    /// Acceleration [steps/s²]; zero disables ramping.
    pub acceleration: u32,
    /// Total pulses to emit over the whole movement.
    pub step_count: i32,
    /// Travel direction.
    pub direction: Direction,
}

impl Movement {
    /// Create a new movement request.
    pub const fn new(
        target_speed: u32,
        acceleration: u32,
        step_count: i32,
        direction: Direction,
    ) -> Self {
        Self {
            target_speed,
            acceleration,
            step_count,
            direction,
        }
    }

    /// Total pulses as an unsigned count (negative step counts emit nothing).
    #[inline]
    pub const fn pulse_count(&self) -> u32 {
        if self.step_count > 0 {
            self.step_count as u32
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_wire_round_trip() {
        assert_eq!(Direction::from_bit(0), Some(Direction::Backward));
        assert_eq!(Direction::from_bit(1), Some(Direction::Forward));
        assert_eq!(Direction::from_bit(2), None);
        assert_eq!(Direction::Forward.bit(), 1);
    }

    #[test]
    fn direction_reversed() {
        assert_eq!(Direction::Forward.reversed(), Direction::Backward);
        assert_eq!(Direction::Backward.reversed(), Direction::Forward);
    }

    #[test]
    fn negative_step_count_yields_zero_pulses() {
        let m = Movement::new(800, 0, -5, Direction::Forward);
        assert_eq!(m.pulse_count(), 0);
    }

    #[test]
    fn positive_step_count_preserved() {
        let m = Movement::new(800, 0, 400, Direction::Forward);
        assert_eq!(m.pulse_count(), 400);
    }
}
