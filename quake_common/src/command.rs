//! Command variants carried between the ingestion and motion contexts.
//!
//! Ordinary commands travel through the bounded command channel and are
//! consumed exactly once by the dispatcher. `Stop` and `Reset` are also
//! expressible as `UrgentSignal`s, which bypass the ordinary queue so they
//! are never starved behind queued motions.

use serde::{Deserialize, Serialize};

use crate::movement::Movement;

/// An ordinary command for the motion context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Execute one bounded movement.
    Move(Movement),
    /// Enter manual oscillation mode with a forward/backward pair.
    Manual {
        forward: Movement,
        backward: Movement,
    },
    /// Re-home the actuator. Normally delivered urgently; a queued
    /// occurrence is treated as a no-op by the dispatcher.
    Reset,
    /// Halt motion. Normally delivered urgently; a queued occurrence is
    /// treated as a no-op by the dispatcher.
    Stop,
}

/// High-priority signal carried by the single-slot urgent channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UrgentSignal {
    /// Halt the current movement and flush the ordinary queue.
    Stop = 1,
    /// Halt the current movement and run the homing sequence.
    Reset = 2,
}

impl UrgentSignal {
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Stop),
            2 => Some(Self::Reset),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_signal_round_trip() {
        assert_eq!(UrgentSignal::from_u8(1), Some(UrgentSignal::Stop));
        assert_eq!(UrgentSignal::from_u8(2), Some(UrgentSignal::Reset));
        assert_eq!(UrgentSignal::from_u8(0), None);
        assert_eq!(UrgentSignal::from_u8(3), None);
    }
}
