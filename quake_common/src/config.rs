//! TOML configuration loader with validation.
//!
//! Loads a `DriveConfig` from a single TOML file and bounds-checks every
//! parameter before the controller starts. Defaults match the shipped
//! actuator hardware, so a missing file or empty table is a valid
//! configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML parse error.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    /// Parameter validation error.
    #[error("config validation failed: {0}")]
    Validation(String),
}

// ─── Sections ───────────────────────────────────────────────────────

/// Motor drive parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    /// Speed floor below which movements run as a single constant phase [steps/s].
    pub min_start_speed_hz: u32,
    /// Highest pulse rate the driver stage accepts [steps/s]. Movements
    /// with a target speed above it are rejected whole.
    pub max_speed_hz: u32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            min_start_speed_hz: 1_600,
            max_speed_hz: 13_000,
        }
    }
}

/// Homing sequence parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Speed of the 1-pulse seek movements toward each limit [steps/s].
    pub seek_speed_hz: u32,
    /// Speed of the final centering movement [steps/s].
    pub center_speed_hz: u32,
    /// Optional bound on pulses issued per seek phase. `None` lets a seek
    /// with a non-responsive sensor block indefinitely.
    pub max_seek_steps: Option<u32>,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            seek_speed_hz: 500,
            center_speed_hz: 1_200,
            max_seek_steps: None,
        }
    }
}

/// Command channel parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Boot-time capacity of the ordinary command queue. Replaceable at
    /// runtime by `BATCH_SIZE`, which discards queued commands.
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 4 }
    }
}

/// Dispatcher loop pacing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Sleep between dispatcher iterations that did no work [ms].
    pub idle_poll_ms: u64,
    /// Heartbeat and line-poll interval of the ingestion transport [ms].
    pub handshake_poll_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            idle_poll_ms: 10,
            handshake_poll_ms: 300,
        }
    }
}

// ─── DriveConfig ────────────────────────────────────────────────────

/// Complete validated drive configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub motor: MotorConfig,
    pub homing: HomingConfig,
    pub channel: ChannelConfig,
    pub dispatcher: DispatcherConfig,
}

impl DriveConfig {
    /// Parse and validate a configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Bounds-check every parameter.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.motor.min_start_speed_hz == 0 {
            return Err(ConfigError::Validation(
                "motor.min_start_speed_hz must be > 0".into(),
            ));
        }
        if self.motor.max_speed_hz < self.motor.min_start_speed_hz {
            return Err(ConfigError::Validation(format!(
                "motor.max_speed_hz ({}) below motor.min_start_speed_hz ({})",
                self.motor.max_speed_hz, self.motor.min_start_speed_hz
            )));
        }
        // Homing movements are unramped; their speeds must stay at or below
        // the constant-speed floor.
        if self.homing.seek_speed_hz == 0
            || self.homing.seek_speed_hz > self.motor.min_start_speed_hz
        {
            return Err(ConfigError::Validation(format!(
                "homing.seek_speed_hz ({}) outside 1..={}",
                self.homing.seek_speed_hz, self.motor.min_start_speed_hz
            )));
        }
        if self.homing.center_speed_hz == 0
            || self.homing.center_speed_hz > self.motor.min_start_speed_hz
        {
            return Err(ConfigError::Validation(format!(
                "homing.center_speed_hz ({}) outside 1..={}",
                self.homing.center_speed_hz, self.motor.min_start_speed_hz
            )));
        }
        if self.homing.max_seek_steps == Some(0) {
            return Err(ConfigError::Validation(
                "homing.max_seek_steps must be > 0 when set".into(),
            ));
        }
        if self.channel.capacity == 0 {
            return Err(ConfigError::Validation(
                "channel.capacity must be >= 1".into(),
            ));
        }
        if self.dispatcher.idle_poll_ms == 0 || self.dispatcher.handshake_poll_ms == 0 {
            return Err(ConfigError::Validation(
                "dispatcher poll intervals must be > 0".into(),
            ));
        }
        Ok(())
    }
}
