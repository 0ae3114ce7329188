//! Command processing root.
//!
//! Bounded command channel, urgent signal slot, line-protocol parser and
//! the motion-context dispatcher loop.

pub mod channel;
pub mod dispatcher;
pub mod parse;
