//! Safety module root.
//!
//! Cooperative cancellation flag and the limit-switch safety monitor.

pub mod monitor;
pub mod stop;
