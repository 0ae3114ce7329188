//! Trapezoidal velocity profile generator.
//!
//! Converts a `Movement` into a physically feasible pulse sequence:
//! accelerate from the speed floor to the target, cruise, decelerate back.
//! Degenerate shapes fall out naturally — a constant profile when the
//! target is at or below the floor, a triangular profile when the plateau
//! is exactly zero steps.
//!
//! ## Feasibility
//!
//! Ramp distance is computed from closed-form kinematics before any pulse
//! is emitted. A request whose step count cannot fit both ramps is
//! rejected whole: zero pulses, typed error.
//!
//! ## Ramp Execution
//!
//! Ramps are step-count-driven: exactly the kinematic ramp step count is
//! emitted, with the per-pulse frequency derived from virtual elapsed time
//! accumulated as one pulse period per pulse and clamped at the target so
//! it never overshoots. The executed pulse count therefore agrees exactly
//! with the feasibility arithmetic regardless of scheduling jitter.
//!
//! ## Cancellation
//!
//! The shared stop flag is polled before each phase, once per ramp
//! iteration, and once per emitted pulse (inside the driver). A cancelled
//! movement halts within one pulse period and skips all remaining phases.

use std::time::{Duration, Instant};

use quake_common::error::ProfileError;
use quake_common::movement::{Direction, Movement};
use tracing::debug;

use crate::hal::driver::StepDriver;
use crate::safety::stop::StopFlag;

// ─── Kinematics ─────────────────────────────────────────────────────

/// Time to ramp from the speed floor to `target_hz` at `acceleration` [s].
///
/// Fails when `acceleration` is zero: the formula would divide by zero.
pub fn ramp_time_s(
    min_start_hz: u32,
    target_hz: u32,
    acceleration: u32,
) -> Result<f64, ProfileError> {
    if acceleration == 0 {
        return Err(ProfileError::ZeroAcceleration);
    }
    Ok(f64::from(target_hz.saturating_sub(min_start_hz)) / f64::from(acceleration))
}

/// Steps covered while ramping for `ramp_time_s` from the speed floor at
/// `acceleration`. Identical for the acceleration and deceleration phases.
pub fn ramp_steps(min_start_hz: u32, ramp_time_s: f64, acceleration: u32) -> i64 {
    let distance = f64::from(min_start_hz) * ramp_time_s
        + 0.5 * f64::from(acceleration) * ramp_time_s * ramp_time_s;
    distance.round() as i64
}

// ─── Phase Report ───────────────────────────────────────────────────

/// Per-phase pulse counts and wall-clock durations of one movement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseReport {
    /// Pulses emitted during the acceleration ramp.
    pub accel_pulses: u32,
    /// Pulses emitted at constant speed.
    pub constant_pulses: u32,
    /// Pulses emitted during the deceleration ramp.
    pub decel_pulses: u32,
    /// Wall-clock duration of the acceleration ramp.
    pub accel_time: Duration,
    /// Wall-clock duration of the constant phase.
    pub constant_time: Duration,
    /// Wall-clock duration of the deceleration ramp.
    pub decel_time: Duration,
}

impl PhaseReport {
    /// Pulses emitted across all phases.
    #[inline]
    pub const fn total_pulses(&self) -> u32 {
        self.accel_pulses + self.constant_pulses + self.decel_pulses
    }
}

/// How a movement ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// All phases ran to completion.
    Completed(PhaseReport),
    /// The stop flag halted the movement partway.
    Cancelled(PhaseReport),
}

impl MoveOutcome {
    /// The phase report regardless of outcome.
    #[inline]
    pub const fn report(&self) -> &PhaseReport {
        match self {
            Self::Completed(report) | Self::Cancelled(report) => report,
        }
    }

    /// Whether the movement was cancelled.
    #[inline]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

// ─── Motion Engine ──────────────────────────────────────────────────

/// Executes movements against a step driver with cooperative cancellation.
#[derive(Debug)]
pub struct MotionEngine<D: StepDriver> {
    driver: D,
    stop: StopFlag,
    /// Speed floor: targets at or below run as a single constant phase.
    min_start_speed: u32,
    /// Speed ceiling: targets above it are rejected whole.
    max_speed: u32,
}

impl<D: StepDriver> MotionEngine<D> {
    /// Create an engine over `driver` polling `stop`.
    pub fn new(driver: D, stop: StopFlag, min_start_speed: u32, max_speed: u32) -> Self {
        Self {
            driver,
            stop,
            min_start_speed,
            max_speed,
        }
    }

    /// The shared cancellation flag.
    #[inline]
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// Run one constant-speed phase: `count` pulses at `speed_hz`.
    ///
    /// Returns the pulses actually emitted (short on cancellation).
    pub fn run_constant(&mut self, speed_hz: u32, count: u32, direction: Direction) -> u32 {
        if count == 0 {
            return 0;
        }
        self.driver.set_direction(direction);
        self.driver
            .emit_pulses(f64::from(speed_hz), count, &self.stop)
    }

    /// Run one ramp phase from `start_hz` to `target_hz` over
    /// `ramp_time_s`, emitting exactly `pulses` pulses unless cancelled.
    ///
    /// Direction is latched once at ramp entry. Each iteration derives the
    /// instantaneous frequency from the virtual elapsed time, clamped at
    /// the target, emits one pulse, and advances virtual time by one pulse
    /// period.
    pub fn run_ramp(
        &mut self,
        start_hz: f64,
        target_hz: f64,
        ramp_time_s: f64,
        pulses: u32,
        direction: Direction,
    ) -> u32 {
        if pulses == 0 || ramp_time_s <= 0.0 {
            return 0;
        }
        self.driver.set_direction(direction);
        let slope = (target_hz - start_hz) / ramp_time_s;
        let mut virtual_elapsed = 0.0_f64;
        let mut emitted = 0;
        for _ in 0..pulses {
            if self.stop.is_set() {
                break;
            }
            let unclamped = start_hz + slope * virtual_elapsed;
            let frequency = if slope >= 0.0 {
                unclamped.min(target_hz)
            } else {
                unclamped.max(target_hz)
            };
            if frequency <= 0.0 {
                break;
            }
            emitted += self.driver.emit_pulses(frequency, 1, &self.stop);
            virtual_elapsed += 1.0 / frequency;
        }
        emitted
    }

    /// Execute a whole movement as a trapezoidal (or degenerate) profile.
    ///
    /// Targets above the speed ceiling are rejected with zero pulses.
    /// Targets at or below the speed floor run as one constant phase for
    /// the entire step count, ignoring acceleration. Otherwise the request
    /// is checked for feasibility first; an infeasible profile emits zero
    /// pulses. The stop flag is checked before each phase and remaining
    /// phases are skipped once it is set.
    pub fn perform_movement(&mut self, movement: &Movement) -> Result<MoveOutcome, ProfileError> {
        let total = movement.pulse_count();

        if movement.target_speed > self.max_speed {
            return Err(ProfileError::SpeedAboveLimit {
                requested: movement.target_speed,
                limit: self.max_speed,
            });
        }

        if movement.target_speed <= self.min_start_speed {
            let started = Instant::now();
            let mut report = PhaseReport::default();
            report.constant_pulses =
                self.run_constant(movement.target_speed, total, movement.direction);
            report.constant_time = started.elapsed();
            return Ok(self.finish(movement, report, false));
        }

        let ramp_time =
            ramp_time_s(self.min_start_speed, movement.target_speed, movement.acceleration)?;
        let ramp_steps_each = ramp_steps(self.min_start_speed, ramp_time, movement.acceleration);
        let constant_steps = i64::from(movement.step_count) - 2 * ramp_steps_each;
        if constant_steps < 0 {
            return Err(ProfileError::Infeasible {
                required: 2 * ramp_steps_each,
                available: i64::from(movement.step_count),
            });
        }

        let floor = f64::from(self.min_start_speed);
        let target = f64::from(movement.target_speed);
        let mut report = PhaseReport::default();

        if !self.stop.is_set() {
            let started = Instant::now();
            report.accel_pulses = self.run_ramp(
                floor,
                target,
                ramp_time,
                ramp_steps_each as u32,
                movement.direction,
            );
            report.accel_time = started.elapsed();
        }
        if !self.stop.is_set() && constant_steps > 0 {
            let started = Instant::now();
            report.constant_pulses = self.run_constant(
                movement.target_speed,
                constant_steps as u32,
                movement.direction,
            );
            report.constant_time = started.elapsed();
        }
        if !self.stop.is_set() {
            let started = Instant::now();
            report.decel_pulses = self.run_ramp(
                target,
                floor,
                ramp_time,
                ramp_steps_each as u32,
                movement.direction,
            );
            report.decel_time = started.elapsed();
        }

        Ok(self.finish(movement, report, constant_steps == 0))
    }

    fn finish(&self, movement: &Movement, report: PhaseReport, triangular: bool) -> MoveOutcome {
        debug!(
            target_speed = movement.target_speed,
            accel_pulses = report.accel_pulses,
            constant_pulses = report.constant_pulses,
            decel_pulses = report.decel_pulses,
            triangular,
            accel_ms = report.accel_time.as_secs_f64() * 1e3,
            constant_ms = report.constant_time.as_secs_f64() * 1e3,
            decel_ms = report.decel_time.as_secs_f64() * 1e3,
            "movement profile executed"
        );
        if self.stop.is_set() {
            MoveOutcome::Cancelled(report)
        } else {
            MoveOutcome::Completed(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::sim::SimRig;

    const FLOOR: u32 = 1_600;
    const CEILING: u32 = 13_000;

    fn engine(rig: &SimRig) -> MotionEngine<crate::hal::sim::SimDriver> {
        MotionEngine::new(rig.driver(), StopFlag::new(), FLOOR, CEILING)
    }

    fn wide_rig() -> SimRig {
        SimRig::new(-1_000_000, 1_000_000, 0)
    }

    // ── Kinematics ──

    #[test]
    fn ramp_time_matches_formula() {
        let t = ramp_time_s(FLOOR, 2_000, 500).unwrap();
        assert!((t - 0.8).abs() < 1e-12);
    }

    #[test]
    fn ramp_time_rejects_zero_acceleration() {
        assert_eq!(
            ramp_time_s(FLOOR, 2_000, 0),
            Err(ProfileError::ZeroAcceleration)
        );
    }

    #[test]
    fn ramp_steps_matches_kinematic_distance() {
        // 1600 * 0.8 + 0.5 * 500 * 0.64 = 1280 + 160 = 1440
        assert_eq!(ramp_steps(FLOOR, 0.8, 500), 1_440);
    }

    // ── Constant profiles ──

    #[test]
    fn floor_speed_runs_single_constant_phase() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        let movement = Movement::new(FLOOR, 9_999, 50, Direction::Forward);
        let outcome = engine.perform_movement(&movement).unwrap();

        let report = outcome.report();
        assert_eq!(report.accel_pulses, 0);
        assert_eq!(report.constant_pulses, 50);
        assert_eq!(report.decel_pulses, 0);
        assert!(!outcome.is_cancelled());

        let trains = rig.trains();
        assert_eq!(trains.len(), 1);
        assert_eq!(trains[0].count, 50);
        assert!((trains[0].frequency_hz - f64::from(FLOOR)).abs() < 1e-9);
    }

    #[test]
    fn below_floor_ignores_acceleration_entirely() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        for accel in [0, 1, 500, u32::MAX] {
            let movement = Movement::new(800, accel, 10, Direction::Backward);
            let outcome = engine.perform_movement(&movement).unwrap();
            assert_eq!(outcome.report().total_pulses(), 10);
        }
        assert_eq!(rig.total_pulses(), 40);
    }

    // ── Infeasible profiles ──

    #[test]
    fn zero_acceleration_above_floor_is_rejected() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        let movement = Movement::new(2_000, 0, 400, Direction::Forward);
        assert_eq!(
            engine.perform_movement(&movement),
            Err(ProfileError::ZeroAcceleration)
        );
        assert_eq!(rig.total_pulses(), 0);
    }

    #[test]
    fn short_request_emits_zero_pulses() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        // Ramps need 2880 steps, only 400 requested.
        let movement = Movement::new(2_000, 500, 400, Direction::Forward);
        assert_eq!(
            engine.perform_movement(&movement),
            Err(ProfileError::Infeasible {
                required: 2_880,
                available: 400,
            })
        );
        assert_eq!(rig.total_pulses(), 0);
    }

    #[test]
    fn target_above_the_ceiling_is_rejected() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        let movement = Movement::new(CEILING + 1, 500, 100_000, Direction::Forward);
        assert_eq!(
            engine.perform_movement(&movement),
            Err(ProfileError::SpeedAboveLimit {
                requested: CEILING + 1,
                limit: CEILING,
            })
        );
        assert_eq!(rig.total_pulses(), 0);
    }

    // ── Trapezoidal & triangular profiles ──

    #[test]
    fn trapezoid_emits_exactly_the_requested_steps() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        // ramp_time = 0.01 s, ramp distance = 16.5 → 17 steps each ramp.
        let movement = Movement::new(1_700, 10_000, 400, Direction::Forward);
        let outcome = engine.perform_movement(&movement).unwrap();

        let report = outcome.report();
        assert_eq!(report.accel_pulses, 17);
        assert_eq!(report.constant_pulses, 366);
        assert_eq!(report.decel_pulses, 17);
        assert_eq!(report.total_pulses(), 400);
        assert_eq!(rig.position(), 400);
    }

    #[test]
    fn acceleration_ramp_frequencies_rise_and_clamp() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        let movement = Movement::new(1_700, 10_000, 400, Direction::Forward);
        engine.perform_movement(&movement).unwrap();

        let trains = rig.trains();
        // 17 accel single-pulse trains, one plateau train, 17 decel trains.
        assert_eq!(trains.len(), 35);
        let accel: Vec<f64> = trains[..17].iter().map(|t| t.frequency_hz).collect();
        assert!((accel[0] - 1_600.0).abs() < 1e-9);
        assert!(accel.windows(2).all(|w| w[1] >= w[0]));
        assert!(accel.iter().all(|f| *f <= 1_700.0 + 1e-9));
        assert!((trains[17].frequency_hz - 1_700.0).abs() < 1e-9);
        let decel: Vec<f64> = trains[18..].iter().map(|t| t.frequency_hz).collect();
        assert!((decel[0] - 1_700.0).abs() < 1e-9);
        assert!(decel.windows(2).all(|w| w[1] <= w[0]));
        assert!(decel.iter().all(|f| *f >= 1_600.0 - 1e-9));
    }

    #[test]
    fn triangular_profile_has_no_plateau() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        // 2 * 17 ramp steps exactly: plateau of zero is valid.
        let movement = Movement::new(1_700, 10_000, 34, Direction::Forward);
        let outcome = engine.perform_movement(&movement).unwrap();

        let report = outcome.report();
        assert_eq!(report.constant_pulses, 0);
        assert_eq!(report.total_pulses(), 34);
        assert!(!outcome.is_cancelled());
    }

    // ── Cancellation ──

    #[test]
    fn preset_stop_flag_skips_every_phase() {
        let rig = wide_rig();
        let mut engine = engine(&rig);
        engine.stop_flag().set();
        let movement = Movement::new(1_700, 10_000, 400, Direction::Forward);
        let outcome = engine.perform_movement(&movement).unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(outcome.report().total_pulses(), 0);
        assert_eq!(rig.total_pulses(), 0);
    }

    /// Driver wrapper that sets the stop flag after a fixed pulse budget.
    struct CancelAfter<D: StepDriver> {
        inner: D,
        remaining: u32,
        stop: StopFlag,
    }

    impl<D: StepDriver> StepDriver for CancelAfter<D> {
        fn set_direction(&mut self, direction: Direction) {
            self.inner.set_direction(direction);
        }

        fn emit_pulses(&mut self, frequency_hz: f64, count: u32, stop: &StopFlag) -> u32 {
            let mut emitted = 0;
            for _ in 0..count {
                if stop.is_set() {
                    break;
                }
                emitted += self.inner.emit_pulses(frequency_hz, 1, stop);
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.stop.set();
                    break;
                }
            }
            emitted
        }
    }

    #[test]
    fn stop_mid_plateau_halts_within_one_pulse() {
        let rig = wide_rig();
        let stop = StopFlag::new();
        let driver = CancelAfter {
            inner: rig.driver(),
            remaining: 100,
            stop: stop.clone(),
        };
        let mut engine = MotionEngine::new(driver, stop, FLOOR, CEILING);

        let movement = Movement::new(1_700, 10_000, 400, Direction::Forward);
        let outcome = engine.perform_movement(&movement).unwrap();
        assert!(outcome.is_cancelled());
        // 17 ramp pulses then the plateau train, truncated at the budget.
        let report = outcome.report();
        assert_eq!(report.accel_pulses, 17);
        assert_eq!(report.constant_pulses, 83);
        assert_eq!(report.decel_pulses, 0);
        assert_eq!(rig.total_pulses(), 100);
    }
}
