//! # Directional Pad
//!
//! The hat switch carries a direction, not a press, so it bypasses the
//! debounce machinery entirely: every change of direction fires the callback
//! immediately, including the return to center.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type DirectionCallback = Box<dyn FnMut(i8, i8) + Send + 'static>;

struct DPadInner {
    value: (i8, i8),
    callback: Option<DirectionCallback>,
}

/// Four-way hat switch state with an immediate direction-change callback.
#[derive(Clone)]
pub struct DPad {
    inner: Arc<Mutex<DPadInner>>,
}

impl Default for DPad {
    fn default() -> Self {
        Self::new()
    }
}

impl DPad {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(DPadInner {
                value: (0, 0),
                callback: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DPadInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the callback invoked on every direction change.
    pub fn set_callback(&self, callback: impl FnMut(i8, i8) + Send + 'static) {
        self.lock().callback = Some(Box::new(callback));
    }

    /// Current direction, each axis -1, 0 or 1.
    #[must_use]
    pub fn value(&self) -> (i8, i8) {
        self.lock().value
    }

    /// Applies a new direction. Fires the callback if it differs from the
    /// current one; the callback runs outside the internal lock.
    pub fn set(&self, x: i8, y: i8) {
        let mut callback = {
            let mut inner = self.lock();
            if inner.value == (x, y) {
                return;
            }
            inner.value = (x, y);
            inner.callback.take()
        };
        if let Some(cb) = callback.as_mut() {
            cb(x, y);
        }
        if let Some(cb) = callback {
            let mut inner = self.lock();
            // A callback registered during the invocation wins.
            if inner.callback.is_none() {
                inner.callback = Some(cb);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_dpad() -> (DPad, Arc<Mutex<Vec<(i8, i8)>>>) {
        let dpad = DPad::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner = Arc::clone(&log);
        dpad.set_callback(move |x, y| inner.lock().unwrap().push((x, y)));
        (dpad, log)
    }

    #[test]
    fn test_fires_on_every_direction_change() {
        let (dpad, log) = recording_dpad();

        dpad.set(1, 0);
        dpad.set(1, 1);
        dpad.set(0, 0);
        assert_eq!(*log.lock().unwrap(), vec![(1, 0), (1, 1), (0, 0)]);
    }

    #[test]
    fn test_unchanged_direction_does_not_fire() {
        let (dpad, log) = recording_dpad();

        dpad.set(0, -1);
        dpad.set(0, -1);
        dpad.set(0, -1);
        assert_eq!(*log.lock().unwrap(), vec![(0, -1)]);
    }

    #[test]
    fn test_initial_center_is_not_a_change() {
        let (dpad, log) = recording_dpad();

        dpad.set(0, 0);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(dpad.value(), (0, 0));
    }

    #[test]
    fn test_value_tracks_latest_direction() {
        let dpad = DPad::new();
        dpad.set(-1, 1);
        assert_eq!(dpad.value(), (-1, 1));
        dpad.set(0, 0);
        assert_eq!(dpad.value(), (0, 0));
    }

    #[test]
    fn test_set_without_callback_is_fine() {
        let dpad = DPad::new();
        dpad.set(1, 0);
        assert_eq!(dpad.value(), (1, 0));
    }

    #[test]
    fn test_callback_may_read_dpad_value() {
        // The callback runs outside the lock, so touching the dpad from
        // inside it must not deadlock.
        let dpad = DPad::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let handle = dpad.clone();
            let seen = Arc::clone(&seen);
            dpad.set_callback(move |_, _| {
                seen.lock().unwrap().push(handle.value());
            });
        }
        dpad.set(0, 1);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 1)]);
    }
}
