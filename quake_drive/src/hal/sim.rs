//! Simulation rig.
//!
//! Software-emulated actuator for development and testing: records every
//! pulse train, tracks a virtual carriage position between two configurable
//! limit positions, and delivers newly-asserted limit edges to an optional
//! hook (wired to the safety monitor by the binary).
//!
//! Positions are in steps: forward pulses increment, backward pulses
//! decrement. The back switch asserts at `position <= back_limit`, the
//! front switch at `position >= front_limit`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use quake_common::movement::Direction;

use crate::hal::driver::{LimitSide, LimitSwitches, StepDriver};
use crate::safety::stop::StopFlag;

type EdgeHook = Arc<dyn Fn(LimitSide) + Send + Sync>;

/// One recorded call to `emit_pulses`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseTrain {
    /// Direction latched when the train was emitted.
    pub direction: Direction,
    /// Pulse rate [steps/s].
    pub frequency_hz: f64,
    /// Pulses actually emitted (may be short of the request on cancel).
    pub count: u32,
}

struct SimState {
    position: i64,
    back_limit: i64,
    front_limit: i64,
    direction: Direction,
    back_asserted: bool,
    front_asserted: bool,
    trains: Vec<PulseTrain>,
    edge_hook: Option<EdgeHook>,
}

// The edge hook is an opaque closure; report everything else.
impl fmt::Debug for SimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimState")
            .field("position", &self.position)
            .field("back_limit", &self.back_limit)
            .field("front_limit", &self.front_limit)
            .field("direction", &self.direction)
            .field("back_asserted", &self.back_asserted)
            .field("front_asserted", &self.front_asserted)
            .field("trains", &self.trains)
            .finish_non_exhaustive()
    }
}

impl SimState {
    fn refresh_limits(&mut self) -> Vec<LimitSide> {
        let mut edges = Vec::new();
        let back_now = self.position <= self.back_limit;
        let front_now = self.position >= self.front_limit;
        if back_now && !self.back_asserted {
            edges.push(LimitSide::Back);
        }
        if front_now && !self.front_asserted {
            edges.push(LimitSide::Front);
        }
        self.back_asserted = back_now;
        self.front_asserted = front_now;
        edges
    }
}

/// Shared simulated actuator. Hand out a [`SimDriver`] to the motion
/// context and a [`SimSwitches`] wherever switch levels are read.
#[derive(Debug, Clone)]
pub struct SimRig {
    state: Arc<Mutex<SimState>>,
}

impl SimRig {
    /// Create a rig with the given limit positions and starting carriage
    /// position (all in steps).
    pub fn new(back_limit: i64, front_limit: i64, start_position: i64) -> Self {
        let mut state = SimState {
            position: start_position,
            back_limit,
            front_limit,
            direction: Direction::Forward,
            back_asserted: false,
            front_asserted: false,
            trains: Vec::new(),
            edge_hook: None,
        };
        // Establish initial switch levels without firing edges.
        state.back_asserted = state.position <= state.back_limit;
        state.front_asserted = state.position >= state.front_limit;
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Step driver handle for the motion context.
    pub fn driver(&self) -> SimDriver {
        SimDriver { rig: self.clone() }
    }

    /// Limit switch handle.
    pub fn switches(&self) -> SimSwitches {
        SimSwitches { rig: self.clone() }
    }

    /// Install the edge notification hook.
    ///
    /// Called once per newly-asserted switch, outside the rig lock, so the
    /// hook may read the rig.
    pub fn set_edge_hook(&self, hook: impl Fn(LimitSide) + Send + Sync + 'static) {
        self.lock().edge_hook = Some(Arc::new(hook));
    }

    /// Current carriage position [steps].
    pub fn position(&self) -> i64 {
        self.lock().position
    }

    /// All pulse trains recorded so far.
    pub fn trains(&self) -> Vec<PulseTrain> {
        self.lock().trains.clone()
    }

    /// Total pulses emitted across all trains.
    pub fn total_pulses(&self) -> u64 {
        self.lock().trains.iter().map(|t| u64::from(t.count)).sum()
    }
}

/// `StepDriver` backend over a [`SimRig`].
#[derive(Debug)]
pub struct SimDriver {
    rig: SimRig,
}

impl StepDriver for SimDriver {
    fn set_direction(&mut self, direction: Direction) {
        self.rig.lock().direction = direction;
    }

    fn emit_pulses(&mut self, frequency_hz: f64, count: u32, stop: &StopFlag) -> u32 {
        if frequency_hz <= 0.0 || count == 0 {
            return 0;
        }
        let mut emitted = 0;
        for _ in 0..count {
            if stop.is_set() {
                break;
            }
            let (edges, hook) = {
                let mut state = self.rig.lock();
                match state.direction {
                    Direction::Forward => state.position += 1,
                    Direction::Backward => state.position -= 1,
                }
                (state.refresh_limits(), state.edge_hook.clone())
            };
            if let Some(hook) = hook {
                for side in edges {
                    hook(side);
                }
            }
            emitted += 1;
        }
        if emitted > 0 {
            let mut state = self.rig.lock();
            let direction = state.direction;
            state.trains.push(PulseTrain {
                direction,
                frequency_hz,
                count: emitted,
            });
        }
        emitted
    }
}

/// `LimitSwitches` backend over a [`SimRig`].
#[derive(Debug, Clone)]
pub struct SimSwitches {
    rig: SimRig,
}

impl LimitSwitches for SimSwitches {
    fn is_asserted(&self, side: LimitSide) -> bool {
        let state = self.rig.lock();
        match side {
            LimitSide::Back => state.back_asserted,
            LimitSide::Front => state.front_asserted,
        }
    }
}
