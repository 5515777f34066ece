//! # Controller
//!
//! Facade over the per-button state machines, the directional pad and the
//! combination mediator. One `Controller` models one physical gamepad; feed
//! it frames with [`Controller::apply_sample`] and register gestures on the
//! buttons it hands out.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::button::lock_core;
use super::combination::{Combination, Mediator};
use super::{shared, Button, ButtonId, DPad, InputSample};
use crate::config::{Config, Timing};
use crate::error::{Result, SynthBridgeError};
use crate::timer::Scheduler;

/// All input state machines for one gamepad.
pub struct Controller {
    buttons: HashMap<ButtonId, Button>,
    dpad: DPad,
    combinations: Vec<Arc<Combination>>,
    mediator: Arc<Mediator>,
    timing: Timing,
}

impl Controller {
    /// Builds a controller with every digital input tracked.
    ///
    /// Spawns the shared callback scheduler, so this must run inside a tokio
    /// runtime.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let scheduler = Scheduler::spawn();
        let timing = Timing::from_config(&config.timing);

        let buttons: HashMap<ButtonId, Button> = ButtonId::ALL
            .into_iter()
            .map(|id| (id, Button::new(id, scheduler.clone(), timing)))
            .collect();

        let cores = buttons
            .iter()
            .map(|(id, button)| (*id, Arc::downgrade(button.core())))
            .collect();
        let mediator = Arc::new(Mediator::new(scheduler, timing.event_delay, cores));

        info!("Controller initialized with {} buttons", buttons.len());
        Self {
            buttons,
            dpad: DPad::new(),
            combinations: Vec::new(),
            mediator,
            timing,
        }
    }

    /// The state machine for one button.
    ///
    /// # Panics
    ///
    /// Never panics; every [`ButtonId`] is tracked from construction.
    #[must_use]
    pub fn button(&self, id: ButtonId) -> &Button {
        &self.buttons[&id]
    }

    /// The directional pad.
    #[must_use]
    pub fn dpad(&self) -> &DPad {
        &self.dpad
    }

    /// Registers a multi-press threshold on one button.
    ///
    /// # Errors
    ///
    /// See [`Button::add_multi_press`].
    pub fn register_multi_press(
        &self,
        id: ButtonId,
        repeats: u32,
        callback: impl FnMut() + Send + 'static,
    ) -> Result<()> {
        self.buttons[&id].add_multi_press(repeats, callback)
    }

    /// Registers a button combination.
    ///
    /// Member order does not matter. The combination window equals the
    /// debounce window, so a chord must land about as fast as a double press.
    ///
    /// # Errors
    ///
    /// Returns [`SynthBridgeError::InvalidCombination`] for fewer than two
    /// distinct members and [`SynthBridgeError::DuplicateCombination`] when
    /// the same member set is already registered.
    pub fn register_combination(
        &mut self,
        members: &[ButtonId],
        callback: impl FnMut() + Send + 'static,
    ) -> Result<()> {
        let mut ids = members.to_vec();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() < 2 {
            return Err(SynthBridgeError::InvalidCombination(describe(members)));
        }
        if self
            .combinations
            .iter()
            .any(|existing| existing.buttons() == ids.as_slice())
        {
            return Err(SynthBridgeError::DuplicateCombination(describe(&ids)));
        }

        let combination = Arc::new(Combination::new(
            ids.clone(),
            self.timing.event_delay,
            shared(callback),
            Arc::clone(&self.mediator),
        ));
        for id in &ids {
            self.buttons[id].add_combination(Arc::clone(&combination));
        }
        debug!("Registered combination {}", describe(&ids));
        self.combinations.push(combination);
        Ok(())
    }

    /// Applies one frame of controller state to every input.
    pub fn apply_sample(&self, sample: &InputSample) {
        for id in ButtonId::ALL {
            self.buttons[&id].set(sample.button(id));
        }
        self.dpad.set(sample.dpad_x, sample.dpad_y);
    }

    /// Drops all pending gesture callbacks, for shutdown.
    pub fn cancel_pending(&self) {
        for button in self.buttons.values() {
            lock_core(button.core()).empty_queues();
        }
    }
}

fn describe(members: &[ButtonId]) -> String {
    members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("+")
}
