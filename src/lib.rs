//! # Synth Bridge Library
//!
//! Turn a gamepad into an expressive synthesizer control surface.
//!
//! This library provides the core functionality for translating raw gamepad
//! samples into debounced gesture events (press, hold, multi-press, chord)
//! and continuous motion descriptors (stick velocity, press density) suitable
//! for driving audio parameters.

pub mod analysis;
pub mod config;
pub mod error;
pub mod input;
pub mod timer;
