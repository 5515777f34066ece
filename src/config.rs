//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! All timing windows are expressed in milliseconds and converted to
//! [`Duration`]s once, at [`Timing::from_config`] time. The sampling tick
//! rate (`fps`) sizes the analysis ring buffers, so it is validated to a
//! range the trackers can work with.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub analysis: AnalysisConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Button event timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    /// Input sampling rate in ticks per second.
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Maximum gap between two presses for them to count as consecutive
    /// repeats; also the combination window and the debounce delay for
    /// queued press/release sequences.
    #[serde(default = "default_event_delay_ms")]
    pub event_delay_ms: u64,

    /// Time a button must stay pressed to count as a hold event.
    #[serde(default = "default_hold_delay_ms")]
    pub hold_delay_ms: u64,

    /// Period between recurrent hold callbacks when repeat is enabled.
    #[serde(default = "default_hold_repeat_delay_ms")]
    pub hold_repeat_delay_ms: u64,

    /// Extra delay separating a queued state update from the user callback
    /// that follows it, so the two always resolve in order.
    #[serde(default = "default_callback_stagger_ms")]
    pub callback_stagger_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            event_delay_ms: default_event_delay_ms(),
            hold_delay_ms: default_hold_delay_ms(),
            hold_repeat_delay_ms: default_hold_repeat_delay_ms(),
            callback_stagger_ms: default_callback_stagger_ms(),
        }
    }
}

/// Analysis output configuration
#[derive(Debug, Deserialize, Clone)]
pub struct AnalysisConfig {
    /// Ticks between analysis snapshot log lines in the binary.
    #[serde(default = "default_snapshot_interval_ticks")]
    pub snapshot_interval_ticks: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ticks: default_snapshot_interval_ticks(),
        }
    }
}

// Default value functions
fn default_fps() -> u32 { 60 }
fn default_event_delay_ms() -> u64 { 180 }
fn default_hold_delay_ms() -> u64 { 1000 }
fn default_hold_repeat_delay_ms() -> u64 { 500 }
fn default_callback_stagger_ms() -> u64 { 10 }
fn default_snapshot_interval_ticks() -> u32 { 60 }

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use synth_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file if it exists, otherwise fall back to
    /// built-in defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // The short-term velocity ring is fps/5 samples long, so the tick
        // rate must be at least 5 for it to hold anything.
        if self.timing.fps < 5 || self.timing.fps > 240 {
            return Err(crate::error::SynthBridgeError::Config(
                toml::de::Error::custom("fps must be between 5 and 240")
            ));
        }

        if self.timing.event_delay_ms == 0 || self.timing.event_delay_ms > 5000 {
            return Err(crate::error::SynthBridgeError::Config(
                toml::de::Error::custom("event_delay_ms must be between 1 and 5000")
            ));
        }

        if self.timing.hold_delay_ms == 0 || self.timing.hold_delay_ms > 10000 {
            return Err(crate::error::SynthBridgeError::Config(
                toml::de::Error::custom("hold_delay_ms must be between 1 and 10000")
            ));
        }

        if self.timing.hold_repeat_delay_ms == 0 || self.timing.hold_repeat_delay_ms > 10000 {
            return Err(crate::error::SynthBridgeError::Config(
                toml::de::Error::custom("hold_repeat_delay_ms must be between 1 and 10000")
            ));
        }

        if self.timing.callback_stagger_ms >= self.timing.event_delay_ms {
            return Err(crate::error::SynthBridgeError::Config(
                toml::de::Error::custom("callback_stagger_ms must be smaller than event_delay_ms")
            ));
        }

        if self.analysis.snapshot_interval_ticks == 0 {
            return Err(crate::error::SynthBridgeError::Config(
                toml::de::Error::custom("snapshot_interval_ticks must be greater than 0")
            ));
        }

        Ok(())
    }
}

/// Resolved timing windows used by the input core.
///
/// Built once from a [`TimingConfig`] so the hot path never touches
/// millisecond integers.
#[derive(Debug, Clone, Copy)]
pub struct Timing {
    /// Debounce window / combination window.
    pub event_delay: Duration,
    /// Hold confirmation delay.
    pub hold_delay: Duration,
    /// Hold-repeat period.
    pub hold_repeat_delay: Duration,
    /// Queued-callback stagger offset.
    pub callback_stagger: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from_config(&TimingConfig::default())
    }
}

impl Timing {
    /// Converts a millisecond-based config section into durations.
    #[must_use]
    pub fn from_config(config: &TimingConfig) -> Self {
        Self {
            event_delay: Duration::from_millis(config.event_delay_ms),
            hold_delay: Duration::from_millis(config.hold_delay_ms),
            hold_repeat_delay: Duration::from_millis(config.hold_repeat_delay_ms),
            callback_stagger: Duration::from_millis(config.callback_stagger_ms),
        }
    }
}
