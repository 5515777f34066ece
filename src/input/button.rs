//! # Button State Machine
//!
//! Per-button gesture disambiguation.
//!
//! A raw edge never fires a user callback directly when anything could still
//! reinterpret it. Instead the press queues its provisional callbacks behind
//! the debounce window; a second press, a hold or a combination arriving
//! inside the window retracts the queued interpretation and substitutes its
//! own. Only buttons with nothing registered against them (no combinations,
//! no multi-press thresholds) skip the window and fire synchronously.
//!
//! Queued interpretations resolve in three staggered steps so observers
//! always see a consistent ordering: the logical state updates first, then
//! the press or release callback, then the state-change callback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::time::Instant;
use tracing::trace;

use super::combination::Combination;
use super::{invoke, invoke_state, shared, shared_state};
use super::{ButtonId, ButtonMode, SharedCallback, SharedStateCallback};
use crate::config::Timing;
use crate::error::{Result, SynthBridgeError};
use crate::timer::{CallbackQueue, Scheduler, TimerHandle};

pub(crate) fn lock_core(core: &Mutex<ButtonCore>) -> MutexGuard<'_, ButtonCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A callback captured while the core lock was held, to be invoked after it
/// is released. User callbacks may call back into the button.
enum Deferred {
    Plain(SharedCallback),
    State(SharedStateCallback, bool),
}

impl Deferred {
    fn run(self) {
        match self {
            Deferred::Plain(cb) => invoke(&cb),
            Deferred::State(cb, state) => invoke_state(&cb, state),
        }
    }
}

struct MultiPress {
    repeats: u32,
    callback: SharedCallback,
}

pub(crate) struct ButtonCore {
    id: ButtonId,
    weak_self: Weak<Mutex<ButtonCore>>,
    mode: ButtonMode,
    /// Logical state, updated only when a gesture resolves.
    state: bool,
    /// Raw physical value from the latest sample.
    value: bool,
    pressed_at: Option<Instant>,
    repeats: u32,
    repeat_hold: bool,
    hold_valid: bool,
    /// The current gesture queued its basic callbacks.
    queue_basic: bool,
    /// The current gesture fired its basic callbacks synchronously.
    trigger_basic: bool,
    timing: Timing,
    scheduler: Scheduler,
    event_queue: CallbackQueue,
    hold_queue: CallbackQueue,
    hold_loop: Option<TimerHandle>,
    on_press: Option<SharedCallback>,
    on_release: Option<SharedCallback>,
    on_hold: Option<SharedCallback>,
    on_state: Option<SharedStateCallback>,
    /// Sorted ascending by threshold.
    multi_press: Vec<MultiPress>,
    combinations: Vec<Arc<Combination>>,
}

impl ButtonCore {
    fn enter_callback_logic(&mut self, pressed: bool, deferred: &mut Vec<Deferred>) {
        if pressed {
            self.on_press(deferred);
        } else {
            self.on_release(deferred);
            self.queue_basic = false;
            self.trigger_basic = false;
        }
    }

    fn on_press(&mut self, deferred: &mut Vec<Deferred>) {
        let now = Instant::now();
        self.repeats = match self.pressed_at {
            Some(at) if now.duration_since(at) <= self.timing.event_delay => self.repeats + 1,
            _ => 1,
        };
        self.pressed_at = Some(now);
        trace!("Button {} pressed (repeat {})", self.id, self.repeats);

        self.arm_hold();

        if !self.combinations.is_empty() {
            // Combination members never fire synchronously; the mediator
            // must be able to retract anything they queue.
            if self.repeats > 1 {
                if let Some(cb) = self.multi_press_callback(self.repeats) {
                    self.retract_queued();
                    self.event_queue.queue(move || invoke(&cb));
                }
            }
            if self.event_queue.is_empty() {
                self.queue_press_sequence();
            }
        } else if !self.multi_press.is_empty() {
            if self.repeats == 1 {
                self.queue_press_sequence();
            } else if let Some(cb) = self.multi_press_callback(self.repeats) {
                self.retract_queued();
                if Some(self.repeats) == self.max_multi_press() {
                    // Highest threshold reached: nothing can supersede the
                    // gesture anymore, skip the window.
                    deferred.push(Deferred::Plain(cb));
                } else {
                    self.event_queue.queue(move || invoke(&cb));
                }
            }
        } else {
            // Nothing to disambiguate against.
            self.trigger_basic = true;
            self.apply_press_to_state();
            if let Some(cb) = &self.on_press {
                deferred.push(Deferred::Plain(cb.clone()));
            }
            if let Some(cb) = &self.on_state {
                deferred.push(Deferred::State(cb.clone(), self.state));
            }
        }
    }

    fn on_release(&mut self, deferred: &mut Vec<Deferred>) {
        trace!("Button {} released", self.id);
        if self.hold_valid {
            // The hold already consumed this gesture; the release only ends
            // it, it is not a click. A momentary button still needs its
            // state returned to released, a toggle keeps its state because
            // the pair never completed as a click.
            self.hold_valid = false;
            if let Some(handle) = self.hold_loop.take() {
                handle.cancel();
            }
            if self.mode == ButtonMode::Momentary {
                self.state = false;
                if let Some(cb) = &self.on_state {
                    deferred.push(Deferred::State(cb.clone(), false));
                }
            }
            return;
        }

        self.hold_queue.empty();
        if self.trigger_basic {
            self.apply_release_to_state();
            if let Some(cb) = &self.on_release {
                deferred.push(Deferred::Plain(cb.clone()));
            }
            if let Some(cb) = &self.on_state {
                deferred.push(Deferred::State(cb.clone(), self.state));
            }
        } else if self.queue_basic {
            self.queue_release_sequence();
        }
        // Neither flag set: the press was reinterpreted (multi-press or
        // combination), the release carries no gesture of its own.
    }

    /// Arms the hold timer for the press in flight. Fires only while the
    /// button is still down because a release empties the hold queue.
    fn arm_hold(&mut self) {
        let weak = self.weak_self.clone();
        self.hold_queue.queue(move || {
            let Some(core) = weak.upgrade() else { return };
            let fire = {
                let mut core = lock_core(&core);
                core.on_hold.clone().map(|cb| {
                    core.hold_valid = true;
                    if core.repeat_hold {
                        let repeat_cb = cb.clone();
                        let handle = core
                            .scheduler
                            .schedule_repeating(core.timing.hold_repeat_delay, move || {
                                invoke(&repeat_cb);
                            });
                        core.hold_loop = Some(handle);
                    }
                    cb
                })
            };
            if let Some(cb) = fire {
                invoke(&cb);
            }
        });
    }

    /// Queues the press interpretation behind the debounce window:
    /// state update, then press callback, then state callback.
    fn queue_press_sequence(&mut self) {
        self.queue_basic = true;
        let stagger = self.timing.callback_stagger;

        let weak = self.weak_self.clone();
        self.event_queue.queue(move || {
            if let Some(core) = weak.upgrade() {
                lock_core(&core).apply_press_to_state();
            }
        });
        if let Some(cb) = self.on_press.clone() {
            self.event_queue
                .queue_with_offset(move || invoke(&cb), stagger);
        }
        if let Some(cb) = self.on_state.clone() {
            let weak = self.weak_self.clone();
            self.event_queue.queue_with_offset(
                move || {
                    let Some(core) = weak.upgrade() else { return };
                    let state = lock_core(&core).state;
                    invoke_state(&cb, state);
                },
                stagger * 2,
            );
        }
    }

    fn queue_release_sequence(&mut self) {
        let stagger = self.timing.callback_stagger;

        let weak = self.weak_self.clone();
        self.event_queue.queue(move || {
            if let Some(core) = weak.upgrade() {
                lock_core(&core).apply_release_to_state();
            }
        });
        if let Some(cb) = self.on_release.clone() {
            self.event_queue
                .queue_with_offset(move || invoke(&cb), stagger);
        }
        if let Some(cb) = self.on_state.clone() {
            let weak = self.weak_self.clone();
            self.event_queue.queue_with_offset(
                move || {
                    let Some(core) = weak.upgrade() else { return };
                    let state = lock_core(&core).state;
                    invoke_state(&cb, state);
                },
                stagger * 2,
            );
        }
    }

    /// Cancels queued interpretations of the gesture in flight.
    fn retract_queued(&mut self) {
        self.event_queue.empty();
        self.queue_basic = false;
        self.trigger_basic = false;
    }

    /// Cancels everything pending on this button. Called by the combination
    /// mediator when a combination claims the members' presses.
    pub(crate) fn empty_queues(&mut self) {
        self.event_queue.empty();
        self.hold_queue.empty();
        self.queue_basic = false;
        self.trigger_basic = false;
    }

    fn multi_press_callback(&self, repeats: u32) -> Option<SharedCallback> {
        self.multi_press
            .iter()
            .find(|mp| mp.repeats == repeats)
            .map(|mp| mp.callback.clone())
    }

    fn max_multi_press(&self) -> Option<u32> {
        self.multi_press.last().map(|mp| mp.repeats)
    }

    /// A press only moves momentary state; a toggle waits for the pair to
    /// complete and flips on release.
    fn apply_press_to_state(&mut self) {
        if self.mode == ButtonMode::Momentary {
            self.state = true;
        }
    }

    fn apply_release_to_state(&mut self) {
        match self.mode {
            ButtonMode::Momentary => self.state = false,
            ButtonMode::Toggle => self.state = !self.state,
        }
    }
}

/// One debounced, gesture-aware button.
///
/// Cheap to clone; clones share the same core.
#[derive(Clone)]
pub struct Button {
    id: ButtonId,
    core: Arc<Mutex<ButtonCore>>,
}

impl Button {
    pub(crate) fn new(id: ButtonId, scheduler: Scheduler, timing: Timing) -> Self {
        let core = Arc::new_cyclic(|weak: &Weak<Mutex<ButtonCore>>| {
            Mutex::new(ButtonCore {
                id,
                weak_self: weak.clone(),
                mode: ButtonMode::Momentary,
                state: false,
                value: false,
                pressed_at: None,
                repeats: 0,
                repeat_hold: false,
                hold_valid: false,
                queue_basic: false,
                trigger_basic: false,
                timing,
                event_queue: CallbackQueue::new(scheduler.clone(), timing.event_delay),
                hold_queue: CallbackQueue::new(scheduler.clone(), timing.hold_delay),
                scheduler,
                hold_loop: None,
                on_press: None,
                on_release: None,
                on_hold: None,
                on_state: None,
                multi_press: Vec::new(),
                combinations: Vec::new(),
            })
        });
        Self { id, core }
    }

    pub(crate) fn core(&self) -> &Arc<Mutex<ButtonCore>> {
        &self.core
    }

    pub(crate) fn add_combination(&self, combination: Arc<Combination>) {
        lock_core(&self.core).combinations.push(combination);
    }

    /// Which input this button tracks.
    #[must_use]
    pub fn id(&self) -> ButtonId {
        self.id
    }

    /// Raw physical value from the latest sample.
    #[must_use]
    pub fn value(&self) -> bool {
        lock_core(&self.core).value
    }

    /// Logical state; lags the physical value by the debounce window and
    /// follows the button's [`ButtonMode`].
    #[must_use]
    pub fn state(&self) -> bool {
        lock_core(&self.core).state
    }

    /// Selects how the logical state follows presses.
    pub fn set_mode(&self, mode: ButtonMode) {
        lock_core(&self.core).mode = mode;
    }

    /// Registers the single-press callback.
    pub fn set_on_press(&self, callback: impl FnMut() + Send + 'static) {
        lock_core(&self.core).on_press = Some(shared(callback));
    }

    /// Registers the release callback.
    pub fn set_on_release(&self, callback: impl FnMut() + Send + 'static) {
        lock_core(&self.core).on_release = Some(shared(callback));
    }

    /// Registers the hold callback. With `repeat` the callback re-fires on
    /// the hold-repeat period for as long as the button stays down.
    pub fn set_on_hold(&self, callback: impl FnMut() + Send + 'static, repeat: bool) {
        let mut core = lock_core(&self.core);
        core.on_hold = Some(shared(callback));
        core.repeat_hold = repeat;
    }

    /// Registers the logical-state-change callback.
    pub fn set_state_callback(&self, callback: impl FnMut(bool) + Send + 'static) {
        lock_core(&self.core).on_state = Some(shared_state(callback));
    }

    /// Registers a multi-press threshold.
    ///
    /// # Errors
    ///
    /// Returns [`SynthBridgeError::InvalidMultiPress`] for thresholds below
    /// two. Registering a threshold twice keeps the first callback.
    pub fn add_multi_press(
        &self,
        repeats: u32,
        callback: impl FnMut() + Send + 'static,
    ) -> Result<()> {
        if repeats < 2 {
            return Err(SynthBridgeError::InvalidMultiPress(repeats));
        }
        let mut core = lock_core(&self.core);
        if core.multi_press.iter().any(|mp| mp.repeats == repeats) {
            return Ok(());
        }
        core.multi_press.push(MultiPress {
            repeats,
            callback: shared(callback),
        });
        core.multi_press.sort_by_key(|mp| mp.repeats);
        Ok(())
    }

    /// Applies a new physical value. No-op when unchanged.
    pub fn set(&self, pressed: bool) {
        let mut deferred = Vec::new();
        let combinations = {
            let mut core = lock_core(&self.core);
            if core.value == pressed {
                return;
            }
            core.value = pressed;
            core.enter_callback_logic(pressed, &mut deferred);
            core.combinations.clone()
        };
        // Callbacks and combination notification run outside the core lock;
        // both may re-enter this button.
        for entry in deferred {
            entry.run();
        }
        for combination in combinations {
            combination.set_button_state(self.id, pressed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    const TIMING: Timing = Timing {
        event_delay: Duration::from_millis(180),
        hold_delay: Duration::from_millis(1000),
        hold_repeat_delay: Duration::from_millis(500),
        callback_stagger: Duration::from_millis(10),
    };

    fn button() -> Button {
        Button::new(ButtonId::A, Scheduler::spawn(), TIMING)
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn settle() {
        // Past the debounce window plus both stagger offsets.
        sleep(TIMING.event_delay + TIMING.callback_stagger * 3).await;
    }

    // ========================================================================
    // Fast path (nothing registered that needs disambiguation)
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_press_fires_synchronously_without_registrations() {
        let button = button();
        let (presses, on_press) = counter();
        button.set_on_press(on_press);

        button.set(true);
        assert_eq!(presses.load(Ordering::SeqCst), 1);
        assert!(button.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_fires_synchronously_without_registrations() {
        let button = button();
        let (releases, on_release) = counter();
        button.set_on_release(on_release);

        button.set(true);
        button.set(false);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(!button.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_value_is_ignored() {
        let button = button();
        let (presses, on_press) = counter();
        button.set_on_press(on_press);

        button.set(true);
        button.set(true);
        button.set(true);
        assert_eq!(presses.load(Ordering::SeqCst), 1);
    }

    // ========================================================================
    // Debounced single press
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_single_press_resolves_after_window() {
        let button = button();
        let (presses, on_press) = counter();
        let (doubles, on_double) = counter();
        button.set_on_press(on_press);
        button.add_multi_press(2, on_double).unwrap();

        button.set(true);
        assert_eq!(presses.load(Ordering::SeqCst), 0, "fired inside window");
        assert!(!button.state(), "state updated inside window");

        settle().await;
        assert_eq!(presses.load(Ordering::SeqCst), 1);
        assert_eq!(doubles.load(Ordering::SeqCst), 0);
        assert!(button.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_press_release_pair_resolves_in_order() {
        let button = button();
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = Arc::clone(&order);
            button.set_on_press(move || order.lock().unwrap().push("press"));
        }
        {
            let order = Arc::clone(&order);
            button.set_on_release(move || order.lock().unwrap().push("release"));
        }
        {
            let order = Arc::clone(&order);
            button.set_state_callback(move |s| {
                order.lock().unwrap().push(if s { "on" } else { "off" })
            });
        }
        let (_doubles, on_double) = counter();
        button.add_multi_press(2, on_double).unwrap();

        button.set(true);
        sleep(Duration::from_millis(50)).await;
        button.set(false);

        settle().await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *order.lock().unwrap(),
            vec!["press", "on", "release", "off"]
        );
        assert!(!button.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_right_behind_press_keeps_callback_order() {
        // A one-tick click at a high sample rate: the release lands inside
        // the stagger spacing of the press sequence.
        let button = button();
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let order = Arc::clone(&order);
            button.set_on_press(move || order.lock().unwrap().push("press"));
        }
        {
            let order = Arc::clone(&order);
            button.set_on_release(move || order.lock().unwrap().push("release"));
        }
        {
            let order = Arc::clone(&order);
            button.set_state_callback(move |s| {
                order.lock().unwrap().push(if s { "on" } else { "off" })
            });
        }
        let (_doubles, on_double) = counter();
        button.add_multi_press(2, on_double).unwrap();

        button.set(true);
        sleep(Duration::from_millis(5)).await;
        button.set(false);

        settle().await;
        sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *order.lock().unwrap(),
            vec!["press", "on", "release", "off"]
        );
        assert!(!button.state());
    }

    // ========================================================================
    // Multi-press
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_double_press_fires_double_only() {
        let button = button();
        let (presses, on_press) = counter();
        let (releases, on_release) = counter();
        let (doubles, on_double) = counter();
        let (triples, on_triple) = counter();
        button.set_on_press(on_press);
        button.set_on_release(on_release);
        button.add_multi_press(2, on_double).unwrap();
        button.add_multi_press(3, on_triple).unwrap();

        button.set(true);
        sleep(Duration::from_millis(40)).await;
        button.set(false);
        sleep(Duration::from_millis(40)).await;
        button.set(true);
        sleep(Duration::from_millis(40)).await;
        button.set(false);

        settle().await;
        assert_eq!(doubles.load(Ordering::SeqCst), 1);
        assert_eq!(triples.load(Ordering::SeqCst), 0);
        assert_eq!(presses.load(Ordering::SeqCst), 0, "single press leaked");
        assert_eq!(releases.load(Ordering::SeqCst), 0, "release leaked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_highest_threshold_fires_immediately() {
        let button = button();
        let (doubles, on_double) = counter();
        let (triples, on_triple) = counter();
        button.add_multi_press(2, on_double).unwrap();
        button.add_multi_press(3, on_triple).unwrap();

        for _ in 0..2 {
            button.set(true);
            sleep(Duration::from_millis(30)).await;
            button.set(false);
            sleep(Duration::from_millis(30)).await;
        }
        button.set(true);
        // Third press is the highest registered threshold: no window.
        assert_eq!(triples.load(Ordering::SeqCst), 1);
        button.set(false);

        settle().await;
        assert_eq!(triples.load(Ordering::SeqCst), 1);
        assert_eq!(doubles.load(Ordering::SeqCst), 0, "lower threshold leaked");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_presses_count_as_singles() {
        let button = button();
        let (presses, on_press) = counter();
        let (doubles, on_double) = counter();
        button.set_on_press(on_press);
        button.add_multi_press(2, on_double).unwrap();

        for _ in 0..2 {
            button.set(true);
            sleep(Duration::from_millis(30)).await;
            button.set(false);
            // Next press lands outside the repeat window.
            sleep(Duration::from_millis(400)).await;
        }

        assert_eq!(presses.load(Ordering::SeqCst), 2);
        assert_eq!(doubles.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_multi_press_below_two_is_rejected() {
        let button = button();
        let (_count, cb) = counter();
        let err = button.add_multi_press(1, cb).unwrap_err();
        assert!(matches!(err, SynthBridgeError::InvalidMultiPress(1)));
    }

    // ========================================================================
    // Hold
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_hold_fires_after_hold_delay() {
        let button = button();
        let (holds, on_hold) = counter();
        button.set_on_hold(on_hold, false);

        button.set(true);
        sleep(Duration::from_millis(900)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 1);

        button.set(false);
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hold_supersedes_release_click() {
        let button = button();
        let (releases, on_release) = counter();
        let (holds, on_hold) = counter();
        button.set_on_release(on_release);
        button.set_on_hold(on_hold, false);

        button.set(true);
        sleep(Duration::from_millis(1200)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 1);
        button.set(false);

        settle().await;
        assert_eq!(releases.load(Ordering::SeqCst), 0, "hold release clicked");
        assert!(!button.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_before_hold_delay_cancels_hold() {
        let button = button();
        let (releases, on_release) = counter();
        let (holds, on_hold) = counter();
        button.set_on_release(on_release);
        button.set_on_hold(on_hold, false);

        button.set(true);
        sleep(Duration::from_millis(500)).await;
        button.set(false);

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 0);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeating_hold_fires_until_release() {
        let button = button();
        let (holds, on_hold) = counter();
        button.set_on_hold(on_hold, true);

        button.set(true);
        // First fire at 1000ms, repeats at 1500ms and 2000ms.
        sleep(Duration::from_millis(2100)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 3);

        button.set(false);
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(holds.load(Ordering::SeqCst), 3, "repeat survived release");
    }

    // ========================================================================
    // Modes
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_toggle_flips_once_per_completed_pair() {
        let button = button();
        button.set_mode(ButtonMode::Toggle);
        let (_presses, on_press) = counter();
        button.set_on_press(on_press);

        assert!(!button.state());
        button.set(true);
        assert!(!button.state(), "toggle flipped before the pair completed");
        button.set(false);
        assert!(button.state());

        sleep(Duration::from_millis(400)).await;
        button.set(true);
        assert!(button.state());
        button.set(false);
        assert!(!button.state());
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_callback_reports_every_resolved_edge() {
        let button = button();
        button.set_mode(ButtonMode::Toggle);
        let states = Arc::new(Mutex::new(Vec::new()));
        {
            let states = Arc::clone(&states);
            button.set_state_callback(move |s| states.lock().unwrap().push(s));
        }

        button.set(true);
        button.set(false);
        sleep(Duration::from_millis(400)).await;
        button.set(true);
        button.set(false);
        assert_eq!(*states.lock().unwrap(), vec![false, true, true, false]);
    }
}
