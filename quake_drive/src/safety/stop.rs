//! Shared "stop requested" flag.
//!
//! A process-wide cooperative cancellation token. Writers are the safety
//! monitor (on a limit edge) and the ingestion context (on an explicit
//! `STOP`); the motion context polls it once per emitted pulse and once per
//! ramp iteration, bounding stop latency to one pulse period.
//!
//! The flag is monotonic within an operation: it is set, never cleared,
//! except at the start of a new top-level operation (homing, or a freshly
//! dequeued movement). A single atomic suffices; no lock sits on the pulse
//! emission path.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cloneable handle to the shared cancellation flag.
///
/// Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a new, unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.
    #[inline]
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the flag at a top-level operation boundary.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Whether a stop has been requested.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
