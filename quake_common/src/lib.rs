//! Quake Drive Common Library
//!
//! Shared value types, error taxonomy and TOML configuration for the
//! Quake Drive workspace.
//!
//! # Module Structure
//!
//! - [`movement`] - `Movement` and `Direction` value types
//! - [`command`] - `Command` and `UrgentSignal` variants
//! - [`error`] - Motion profile error taxonomy
//! - [`config`] - `DriveConfig` TOML loader with validation

pub mod command;
pub mod config;
pub mod error;
pub mod movement;
