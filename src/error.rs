//! # Error Types
//!
//! Custom error types for Synth Bridge using `thiserror`.
//!
//! All variants are immediate, user-facing configuration errors: they are
//! raised synchronously at registration or load time and are never retried.
//! Runtime scheduling races (a cancelled timer attempting to fire) are benign
//! no-ops, not errors.

use thiserror::Error;

/// Main error type for Synth Bridge
#[derive(Debug, Error)]
pub enum SynthBridgeError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed input sample on the feed
    #[error("Invalid input sample: {0}")]
    Sample(#[from] serde_json::Error),

    /// Registering a combination whose exact button set already exists
    #[error("Combination already registered: {0}")]
    DuplicateCombination(String),

    /// Registering a combination with fewer than two distinct buttons
    #[error("Invalid combination: {0}")]
    InvalidCombination(String),

    /// Registering a multi-press threshold below two presses
    #[error("Invalid multi-press threshold: {0} (at least 2 repeats required)")]
    InvalidMultiPress(u32),

    /// Unrecognized button mode token
    #[error("Invalid button mode: {0:?} (expected momentary, hold, toggle or latch)")]
    InvalidMode(String),
}

/// Result type alias for Synth Bridge
pub type Result<T> = std::result::Result<T, SynthBridgeError>;
