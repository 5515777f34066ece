//! # Button Combinations
//!
//! Simultaneous-press detection with controller-level arbitration.
//!
//! A combination watches its member buttons. When the first member goes down
//! from an all-released state a window opens; if every member is down before
//! the window closes, the combination reports itself to the [`Mediator`].
//!
//! The mediator serializes competing combinations. While a combination's
//! callback is still pending, a newly completed combination replaces it only
//! if it covers every member of the pending one. The subset direction is
//! dropped: a larger chord necessarily completes its sub-chords on the way
//! down, and the partial match must not win over the full one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

use super::button::{lock_core, ButtonCore};
use super::{invoke, ButtonId, SharedCallback};
use crate::timer::{CallbackQueue, Scheduler};

struct WindowState {
    pressed: Vec<bool>,
    window_start: Option<Instant>,
}

/// A set of buttons that fire one callback when pressed together.
pub struct Combination {
    /// Sorted member ids.
    buttons: Vec<ButtonId>,
    /// All members must be down within this much of the first press.
    delta: Duration,
    target: SharedCallback,
    state: Mutex<WindowState>,
    mediator: Arc<Mediator>,
}

impl Combination {
    pub(crate) fn new(
        buttons: Vec<ButtonId>,
        delta: Duration,
        target: SharedCallback,
        mediator: Arc<Mediator>,
    ) -> Self {
        let members = buttons.len();
        Self {
            buttons,
            delta,
            target,
            state: Mutex::new(WindowState {
                pressed: vec![false; members],
                window_start: None,
            }),
            mediator,
        }
    }

    /// Sorted member ids.
    #[must_use]
    pub fn buttons(&self) -> &[ButtonId] {
        &self.buttons
    }

    fn lock_state(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed from a member button after it applied the edge itself.
    pub(crate) fn set_button_state(&self, id: ButtonId, pressed: bool) {
        let complete = {
            let mut state = self.lock_state();
            let Some(index) = self.buttons.iter().position(|b| *b == id) else {
                return;
            };
            if pressed {
                if state.pressed.iter().all(|p| !p) {
                    state.window_start = Some(Instant::now());
                }
                state.pressed[index] = true;
                state.pressed.iter().all(|p| *p)
                    && state
                        .window_start
                        .is_some_and(|start| Instant::now().duration_since(start) <= self.delta)
            } else {
                state.pressed[index] = false;
                false
            }
        };
        if complete {
            trace!("Combination {:?} complete", self.buttons);
            self.mediator.on_combination(self);
        }
    }
}

struct MediatorInner {
    queue: CallbackQueue,
    /// Members of the combination whose callback is queued.
    pending: Vec<ButtonId>,
}

/// Arbitrates between combinations completing close together and retracts
/// the member buttons' own queued gestures when a combination claims them.
pub(crate) struct Mediator {
    inner: Mutex<MediatorInner>,
    buttons: HashMap<ButtonId, Weak<Mutex<ButtonCore>>>,
}

impl Mediator {
    pub(crate) fn new(
        scheduler: Scheduler,
        delay: Duration,
        buttons: HashMap<ButtonId, Weak<Mutex<ButtonCore>>>,
    ) -> Self {
        Self {
            inner: Mutex::new(MediatorInner {
                queue: CallbackQueue::new(scheduler, delay),
                pending: Vec::new(),
            }),
            buttons,
        }
    }

    fn on_combination(&self, combination: &Combination) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.queue.is_empty() {
            debug!("Combination {:?} queued", combination.buttons);
        } else if inner
            .pending
            .iter()
            .all(|id| combination.buttons.contains(id))
        {
            // The new chord covers the pending one: it wins.
            debug!(
                "Combination {:?} supersedes {:?}",
                combination.buttons, inner.pending
            );
            inner.queue.empty();
        } else {
            trace!(
                "Combination {:?} dropped, {:?} already pending",
                combination.buttons,
                inner.pending
            );
            return;
        }

        self.claim_members(&combination.buttons);
        inner.pending = combination.buttons.clone();
        let target = combination.target.clone();
        inner.queue.queue(move || invoke(&target));
    }

    /// Retracts everything the member buttons queued for their own presses.
    fn claim_members(&self, members: &[ButtonId]) {
        for id in members {
            if let Some(core) = self.buttons.get(id).and_then(Weak::upgrade) {
                lock_core(&core).empty_queues();
            }
        }
    }
}
