//! Homing state machine.
//!
//! Establishes absolute position using only the two binary limit switches:
//! seek the back limit with 1-pulse movements, seek the front limit the
//! same way while counting travel, then move halfway back. Phases run
//! `SeekBack → SeekFront → Center → Done`, with `Aborted` reachable from
//! any phase on cancellation or an exceeded seek bound.
//!
//! Entry clears the cancellation flag. Limit-edge stops are suppressed
//! during both seek phases — reaching the switch is the point — and
//! re-armed before the centering move.
//!
//! Without a configured seek bound, a homing run whose sensor never
//! asserts blocks indefinitely.

use quake_common::config::HomingConfig;
use quake_common::movement::{Direction, Movement};
use tracing::{debug, info, warn};

use crate::hal::driver::{LimitSide, LimitSwitches, StepDriver};
use crate::motion::profile::MotionEngine;
use crate::safety::monitor::SafetyMonitor;

/// Phase of the homing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingPhase {
    /// Not homing.
    Idle,
    /// Seeking the back limit with 1-pulse backward movements.
    SeekBack,
    /// Seeking the front limit with 1-pulse forward movements.
    SeekFront,
    /// Moving halfway back between the limits.
    Center,
    /// Homing completed, actuator centered.
    Done,
    /// Homing abandoned; position is not established.
    Aborted,
}

/// Why a homing run aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The shared stop flag was set.
    Cancelled,
    /// A seek phase exceeded the configured step bound.
    SeekBoundExceeded,
}

/// Result of a homing run. Not persisted; returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingOutcome {
    /// The actuator sits halfway between the limits.
    Centered {
        /// Length of the final centering move [steps].
        center_steps: u32,
    },
    /// The run was abandoned.
    Aborted {
        /// Phase in which the abort happened.
        phase: HomingPhase,
        reason: AbortReason,
    },
}

/// Drives the actuator to each limit in turn and centers it.
#[derive(Debug)]
pub struct HomingController {
    config: HomingConfig,
    phase: HomingPhase,
}

impl HomingController {
    /// Create a controller with the given homing parameters.
    pub const fn new(config: HomingConfig) -> Self {
        Self {
            config,
            phase: HomingPhase::Idle,
        }
    }

    /// Phase the last run ended in (`Idle` before the first run).
    #[inline]
    pub const fn phase(&self) -> HomingPhase {
        self.phase
    }

    /// Run the full homing sequence to completion or abort.
    pub fn run<D: StepDriver, L: LimitSwitches>(
        &mut self,
        engine: &mut MotionEngine<D>,
        limits: &L,
        monitor: &SafetyMonitor,
    ) -> HomingOutcome {
        engine.stop_flag().clear();
        info!("homing started");

        // Both seeks deliberately drive into a limit; edge stops stay
        // suppressed until the guard drops.
        let seek_result = {
            let _suppression = monitor.suppress_limit_stop();

            self.phase = HomingPhase::SeekBack;
            if let Err(reason) = self.seek(engine, limits, LimitSide::Back) {
                return self.abort(reason);
            }

            self.phase = HomingPhase::SeekFront;
            match self.seek(engine, limits, LimitSide::Front) {
                Err(reason) => return self.abort(reason),
                Ok(front_count) => front_count,
            }
        };

        self.phase = HomingPhase::Center;
        let center_steps = seek_result / 2;
        let movement = Movement::new(
            self.config.center_speed_hz,
            0,
            center_steps as i32,
            Direction::Backward,
        );
        match engine.perform_movement(&movement) {
            Ok(outcome) if !outcome.is_cancelled() => {}
            Ok(_) => return self.abort(AbortReason::Cancelled),
            Err(error) => {
                // Centering is unramped and validated against the speed
                // floor; a profile error here means a misconfiguration.
                warn!(%error, "centering movement rejected");
                return self.abort(AbortReason::Cancelled);
            }
        }

        self.phase = HomingPhase::Done;
        info!(center_steps, "homing complete, actuator centered");
        HomingOutcome::Centered { center_steps }
    }

    fn abort(&mut self, reason: AbortReason) -> HomingOutcome {
        let phase = self.phase;
        self.phase = HomingPhase::Aborted;
        warn!(?phase, ?reason, "homing aborted");
        HomingOutcome::Aborted { phase, reason }
    }

    /// Issue 1-pulse movements toward `side` until its switch asserts.
    ///
    /// Returns the number of pulses issued, or the abort reason.
    fn seek<D: StepDriver, L: LimitSwitches>(
        &self,
        engine: &mut MotionEngine<D>,
        limits: &L,
        side: LimitSide,
    ) -> Result<u32, AbortReason> {
        let direction = match side {
            LimitSide::Back => Direction::Backward,
            LimitSide::Front => Direction::Forward,
        };
        let step = Movement::new(self.config.seek_speed_hz, 0, 1, direction);
        let mut issued = 0_u32;

        while !limits.is_asserted(side) && !engine.stop_flag().is_set() {
            if let Some(bound) = self.config.max_seek_steps {
                if issued >= bound {
                    return Err(AbortReason::SeekBoundExceeded);
                }
            }
            match engine.perform_movement(&step) {
                Ok(outcome) => issued += outcome.report().total_pulses(),
                Err(error) => {
                    warn!(%error, ?side, "seek movement rejected");
                    return Err(AbortReason::Cancelled);
                }
            }
        }
        if engine.stop_flag().is_set() {
            return Err(AbortReason::Cancelled);
        }
        debug!(?side, issued, "limit reached");
        Ok(issued)
    }
}
