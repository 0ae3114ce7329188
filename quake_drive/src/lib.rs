//! # Quake Drive
//!
//! Motion controller for a linear stepper actuator driven by a host-issued
//! command stream. Executes bounded, interruptible movements with
//! trapezoidal acceleration profiles and limit-switch safety cutoffs.
//!
//! ## Execution Contexts
//!
//! Two long-lived contexts communicate only through the command channel,
//! the urgent slot, and two shared atomic flags:
//!
//! 1. **Ingestion** — parses the line protocol, fills the channels.
//! 2. **Motion** — the dispatcher loop: urgent signals first, then manual
//!    mode, then one ordinary command per iteration.
//!
//! ## Hardware Seam
//!
//! Pulse emission and limit sensing sit behind the [`hal::StepDriver`] and
//! [`hal::LimitSwitches`] traits. The built-in simulation rig implements
//! both for development and testing; a hardware backend implements the
//! same contract.

pub mod command;
pub mod context;
pub mod hal;
pub mod homing;
pub mod ingest;
pub mod motion;
pub mod safety;
