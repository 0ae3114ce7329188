//! Shared controller context.
//!
//! Everything the two execution contexts share lives here, created once at
//! startup and passed deliberately to both sides: the command channel, the
//! urgent slot, the safety monitor (owner of the stop flag) and the
//! manual-mode flag. Both flags are atomics; no lock sits on the pulse
//! emission path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quake_common::config::DriveConfig;

use crate::command::channel::{CommandChannel, UrgentSlot};
use crate::safety::monitor::SafetyMonitor;
use crate::safety::stop::StopFlag;

/// State shared between the ingestion and motion contexts.
#[derive(Debug)]
pub struct DriveContext {
    /// Ordinary command queue.
    pub channel: CommandChannel,
    /// Single-slot urgent path for Stop/Reset.
    pub urgent: UrgentSlot,
    /// Limit-edge safety monitor; owns the stop flag.
    pub monitor: SafetyMonitor,
    /// Whether the dispatcher is in manual oscillation mode.
    pub manual_active: AtomicBool,
}

impl DriveContext {
    /// Build the shared context from configuration.
    pub fn new(config: &DriveConfig) -> Arc<Self> {
        Arc::new(Self {
            channel: CommandChannel::with_capacity(config.channel.capacity),
            urgent: UrgentSlot::new(),
            monitor: SafetyMonitor::new(StopFlag::new()),
            manual_active: AtomicBool::new(false),
        })
    }

    /// The shared cancellation flag.
    #[inline]
    pub fn stop_flag(&self) -> &StopFlag {
        self.monitor.stop_flag()
    }

    /// Whether manual mode is active.
    #[inline]
    pub fn is_manual_active(&self) -> bool {
        self.manual_active.load(Ordering::SeqCst)
    }

    /// Enter or leave manual mode.
    #[inline]
    pub fn set_manual_active(&self, active: bool) {
        self.manual_active.store(active, Ordering::SeqCst);
    }
}
