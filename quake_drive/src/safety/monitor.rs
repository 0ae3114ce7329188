//! Limit-switch safety monitor.
//!
//! Limit inputs idle high; a falling edge means a switch was newly
//! asserted. The hardware adapter delivers each such edge to
//! [`SafetyMonitor::on_limit_edge`], which sets the shared stop flag unless
//! edge stops are currently suppressed. The motion context polls the flag
//! once per pulse, so the stop takes effect within one pulse period.
//!
//! During homing's deliberate approach phases the controller expects to
//! reach a limit legitimately; it suppresses edge stops for the duration
//! via [`SafetyMonitor::suppress_limit_stop`].

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::hal::driver::LimitSide;
use crate::safety::stop::StopFlag;

/// Edge-triggered emergency-stop source for the two travel limits.
#[derive(Debug)]
pub struct SafetyMonitor {
    /// Shared cancellation flag, set on an armed limit edge.
    stop: StopFlag,
    /// When false, limit edges are expected and do not stop motion.
    limit_stop_armed: AtomicBool,
}

impl SafetyMonitor {
    /// Create a monitor writing to `stop`. Edge stops start armed.
    pub fn new(stop: StopFlag) -> Self {
        Self {
            stop,
            limit_stop_armed: AtomicBool::new(true),
        }
    }

    /// The shared cancellation flag.
    #[inline]
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }

    /// Whether limit edges currently trigger a stop.
    #[inline]
    pub fn is_limit_stop_armed(&self) -> bool {
        self.limit_stop_armed.load(Ordering::SeqCst)
    }

    /// Deliver a newly-asserted limit edge (interrupt context).
    ///
    /// Sets the stop flag when armed and not already stopped. The flag is
    /// never cleared here; clearing happens only at operation boundaries.
    pub fn on_limit_edge(&self, side: LimitSide) {
        if !self.is_limit_stop_armed() {
            debug!(?side, "limit edge during suppressed phase, ignoring");
            return;
        }
        if self.stop.is_set() {
            return;
        }
        self.stop.set();
        warn!(?side, "limit switch asserted, stopping motion");
    }

    /// Suppress limit-edge stops until the returned guard is dropped.
    pub fn suppress_limit_stop(&self) -> LimitStopSuppression<'_> {
        self.limit_stop_armed.store(false, Ordering::SeqCst);
        LimitStopSuppression { monitor: self }
    }
}

/// Re-arms limit-edge stops on drop.
#[derive(Debug)]
pub struct LimitStopSuppression<'a> {
    monitor: &'a SafetyMonitor,
}

impl Drop for LimitStopSuppression<'_> {
    fn drop(&mut self) {
        self.monitor.limit_stop_armed.store(true, Ordering::SeqCst);
    }
}
