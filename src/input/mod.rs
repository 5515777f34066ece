//! # Input Event Core
//!
//! Translates raw gamepad samples into debounced, disambiguated gesture
//! callbacks.
//!
//! | Type | Role |
//! |------|------|
//! | [`Controller`] | Owns all buttons, routes samples, mediates combinations |
//! | [`Button`] | Per-button state machine (press, release, hold, multi-press) |
//! | [`DPad`] | Four-way hat switch with a direction-change callback |
//! | [`ButtonId`] | Identifies one of the thirteen digital inputs |
//! | [`InputSample`] | One full frame of controller state |
//!
//! A press is never reported immediately. Each edge opens a short debounce
//! window during which a second press, a registered combination or a hold can
//! reinterpret the gesture; only when the window closes unchallenged do the
//! provisional callbacks fire.

mod button;
mod combination;
mod controller;
mod dpad;

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::SynthBridgeError;

pub use button::Button;
pub use combination::Combination;
pub use controller::Controller;
pub use dpad::DPad;

/// A gesture callback. Shared so the same closure can be queued repeatedly.
pub(crate) type Callback = Box<dyn FnMut() + Send + 'static>;
pub(crate) type SharedCallback = Arc<Mutex<Callback>>;

/// Callback receiving the button's logical state.
pub(crate) type StateCallback = Box<dyn FnMut(bool) + Send + 'static>;
pub(crate) type SharedStateCallback = Arc<Mutex<StateCallback>>;

pub(crate) fn shared(callback: impl FnMut() + Send + 'static) -> SharedCallback {
    Arc::new(Mutex::new(Box::new(callback) as Callback))
}

pub(crate) fn shared_state(callback: impl FnMut(bool) + Send + 'static) -> SharedStateCallback {
    Arc::new(Mutex::new(Box::new(callback) as StateCallback))
}

pub(crate) fn invoke(callback: &SharedCallback) {
    (callback
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner))();
}

pub(crate) fn invoke_state(callback: &SharedStateCallback, state: bool) {
    (callback
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner))(state);
}

/// One of the thirteen digital inputs tracked per controller.
///
/// Triggers are exposed both as analog axes in [`InputSample`] and as digital
/// buttons here; the digitization threshold is the sample producer's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ButtonId {
    A,
    B,
    X,
    Y,
    LeftBumper,
    RightBumper,
    Back,
    Start,
    LeftStick,
    RightStick,
    Guide,
    LeftTrigger,
    RightTrigger,
}

impl ButtonId {
    /// All digital inputs, in a stable order.
    pub const ALL: [ButtonId; 13] = [
        ButtonId::A,
        ButtonId::B,
        ButtonId::X,
        ButtonId::Y,
        ButtonId::LeftBumper,
        ButtonId::RightBumper,
        ButtonId::Back,
        ButtonId::Start,
        ButtonId::LeftStick,
        ButtonId::RightStick,
        ButtonId::Guide,
        ButtonId::LeftTrigger,
        ButtonId::RightTrigger,
    ];
}

impl fmt::Display for ButtonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ButtonId::A => "A",
            ButtonId::B => "B",
            ButtonId::X => "X",
            ButtonId::Y => "Y",
            ButtonId::LeftBumper => "LB",
            ButtonId::RightBumper => "RB",
            ButtonId::Back => "Back",
            ButtonId::Start => "Start",
            ButtonId::LeftStick => "LS",
            ButtonId::RightStick => "RS",
            ButtonId::Guide => "Guide",
            ButtonId::LeftTrigger => "LT",
            ButtonId::RightTrigger => "RT",
        };
        f.write_str(name)
    }
}

/// How a button's logical state follows its physical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ButtonMode {
    /// State mirrors the physical value.
    #[default]
    Momentary,
    /// State flips on each confirmed press; release is ignored.
    Toggle,
}

impl FromStr for ButtonMode {
    type Err = SynthBridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hold" | "momentary" => Ok(ButtonMode::Momentary),
            "toggle" | "latch" => Ok(ButtonMode::Toggle),
            other => Err(SynthBridgeError::InvalidMode(other.to_string())),
        }
    }
}

/// One full frame of controller state, as produced by the sample source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InputSample {
    pub btn_a: bool,
    pub btn_b: bool,
    pub btn_x: bool,
    pub btn_y: bool,
    pub btn_lb: bool,
    pub btn_rb: bool,
    pub btn_back: bool,
    pub btn_start: bool,
    pub btn_ls: bool,
    pub btn_rs: bool,
    pub btn_guide: bool,
    pub btn_lt: bool,
    pub btn_rt: bool,
    /// -1, 0 or 1 per axis.
    pub dpad_x: i8,
    pub dpad_y: i8,
    pub left_x: f32,
    pub left_y: f32,
    pub right_x: f32,
    pub right_y: f32,
    pub left_trigger: f32,
    pub right_trigger: f32,
}

impl InputSample {
    /// Digital value of the given button in this frame.
    #[must_use]
    pub fn button(&self, id: ButtonId) -> bool {
        match id {
            ButtonId::A => self.btn_a,
            ButtonId::B => self.btn_b,
            ButtonId::X => self.btn_x,
            ButtonId::Y => self.btn_y,
            ButtonId::LeftBumper => self.btn_lb,
            ButtonId::RightBumper => self.btn_rb,
            ButtonId::Back => self.btn_back,
            ButtonId::Start => self.btn_start,
            ButtonId::LeftStick => self.btn_ls,
            ButtonId::RightStick => self.btn_rs,
            ButtonId::Guide => self.btn_guide,
            ButtonId::LeftTrigger => self.btn_lt,
            ButtonId::RightTrigger => self.btn_rt,
        }
    }
}
