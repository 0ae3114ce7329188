//! Motion-context dispatcher loop.
//!
//! Per iteration: drain the urgent slot first, then run one manual
//! oscillation cycle if manual mode is active, then try-dequeue one
//! ordinary command. An iteration that did nothing yields briefly to
//! bound busy-wait CPU usage.
//!
//! Urgent handling: `Stop` sets the stop flag and flushes the ordinary
//! queue; `Reset` sets the stop flag and runs the homing sequence. Both
//! leave manual mode.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use quake_common::command::{Command, UrgentSignal};
use quake_common::config::DriveConfig;
use quake_common::movement::Movement;
use tracing::{debug, info, warn};

use crate::context::DriveContext;
use crate::hal::driver::{LimitSwitches, StepDriver};
use crate::homing::{HomingController, HomingOutcome};
use crate::motion::profile::{MotionEngine, MoveOutcome};

/// The motion execution context: routes commands to the motion engine and
/// the homing controller.
pub struct Dispatcher<D: StepDriver, L: LimitSwitches> {
    ctx: Arc<DriveContext>,
    engine: MotionEngine<D>,
    limits: L,
    homing: HomingController,
    /// Pending manual pair while manual mode is active.
    manual_pair: Option<(Movement, Movement)>,
    idle_poll: Duration,
}

impl<D: StepDriver, L: LimitSwitches> Dispatcher<D, L> {
    /// Build a dispatcher over the shared context and hardware handles.
    pub fn new(ctx: Arc<DriveContext>, driver: D, limits: L, config: &DriveConfig) -> Self {
        let engine = MotionEngine::new(
            driver,
            ctx.stop_flag().clone(),
            config.motor.min_start_speed_hz,
            config.motor.max_speed_hz,
        );
        Self {
            ctx,
            engine,
            limits,
            homing: HomingController::new(config.homing),
            manual_pair: None,
            idle_poll: Duration::from_millis(config.dispatcher.idle_poll_ms),
        }
    }

    /// Run the dispatcher until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!("dispatcher running");
        while !shutdown.load(Ordering::SeqCst) {
            if !self.run_iteration() {
                std::thread::sleep(self.idle_poll);
            }
        }
        info!("dispatcher stopped");
    }

    /// One dispatcher iteration. Returns whether any work was done.
    pub fn run_iteration(&mut self) -> bool {
        if let Some(signal) = self.ctx.urgent.take() {
            self.handle_urgent(signal);
            return true;
        }

        if self.ctx.is_manual_active() {
            self.run_manual_cycle();
            return true;
        }

        match self.ctx.channel.try_pop() {
            Some(Command::Move(movement)) => {
                self.ctx.stop_flag().clear();
                self.execute(&movement);
                true
            }
            Some(Command::Manual { forward, backward }) => {
                self.ctx.stop_flag().clear();
                self.manual_pair = Some((forward, backward));
                self.ctx.set_manual_active(true);
                info!("manual mode activated");
                true
            }
            Some(command @ (Command::Stop | Command::Reset)) => {
                // Always delivered urgently; a queued copy is a no-op.
                debug!(?command, "urgent-only command in ordinary queue, ignoring");
                true
            }
            None => false,
        }
    }

    /// Run the homing sequence (also used for startup homing).
    pub fn run_homing(&mut self) -> HomingOutcome {
        self.homing
            .run(&mut self.engine, &self.limits, &self.ctx.monitor)
    }

    fn handle_urgent(&mut self, signal: UrgentSignal) {
        self.ctx.stop_flag().set();
        self.leave_manual_mode();
        match signal {
            UrgentSignal::Stop => {
                let flushed = self.ctx.channel.flush();
                info!(flushed, "stop: motion halted, queue flushed");
            }
            UrgentSignal::Reset => {
                info!("reset: re-homing");
                self.run_homing();
            }
        }
    }

    /// One forward+backward oscillation, then check for cancellation.
    fn run_manual_cycle(&mut self) {
        let Some((forward, backward)) = self.manual_pair else {
            self.leave_manual_mode();
            return;
        };
        let forward_ok = self.execute(&forward);
        let backward_ok = self.execute(&backward);

        let interrupted = self.ctx.stop_flag().is_set() || self.ctx.urgent.is_pending();
        if interrupted || !forward_ok || !backward_ok {
            self.leave_manual_mode();
            info!("manual mode deactivated");
        }
    }

    fn leave_manual_mode(&mut self) {
        self.manual_pair = None;
        self.ctx.set_manual_active(false);
    }

    /// Execute one movement, logging the outcome. Returns whether the
    /// movement was accepted (even if cancelled partway).
    fn execute(&mut self, movement: &Movement) -> bool {
        match self.engine.perform_movement(movement) {
            Ok(MoveOutcome::Completed(report)) => {
                debug!(pulses = report.total_pulses(), "movement completed");
                true
            }
            Ok(MoveOutcome::Cancelled(report)) => {
                info!(pulses = report.total_pulses(), "movement cancelled");
                true
            }
            Err(error) => {
                warn!(%error, ?movement, "movement rejected");
                false
            }
        }
    }
}
