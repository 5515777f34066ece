//! # Callback Queue
//!
//! A group of delayed callbacks sharing one base delay and one cancellation
//! scope.
//!
//! Every callback queued here fires after the queue's base delay (plus an
//! optional per-callback offset used to stagger bursts of callbacks).
//! Deadlines are monotone in insertion order: a callback queued later never
//! fires before one queued earlier, whatever their offsets work out to.
//! [`CallbackQueue::empty`] cancels everything still pending in one call,
//! which is how a button retracts a provisionally queued interpretation when
//! later input reveals a different gesture.

use std::time::Duration;

use tokio::time::Instant;

use super::scheduler::{Scheduler, TimerHandle};

/// An ordered set of pending delayed callbacks with a shared base delay.
#[derive(Debug)]
pub struct CallbackQueue {
    delay: Duration,
    scheduler: Scheduler,
    items: Vec<TimerHandle>,
    /// Deadline of the most recently queued callback; later callbacks are
    /// clamped past it.
    floor: Option<Instant>,
}

impl CallbackQueue {
    /// Creates a queue whose callbacks all fire `delay` after being queued.
    #[must_use]
    pub fn new(scheduler: Scheduler, delay: Duration) -> Self {
        Self {
            delay,
            scheduler,
            items: Vec::new(),
            floor: None,
        }
    }

    /// Queues a callback to fire after the base delay.
    pub fn queue(&mut self, job: impl FnMut() + Send + 'static) -> TimerHandle {
        self.queue_with_offset(job, Duration::ZERO)
    }

    /// Queues a callback to fire after the base delay plus `offset`.
    ///
    /// Offsets keep a burst of related callbacks in a deterministic order
    /// without a shared dispatch thread. A callback queued later never fires
    /// before one still pending from an earlier call, even when its own
    /// delay would land it earlier: its deadline is clamped past the
    /// previous one.
    pub fn queue_with_offset(
        &mut self,
        job: impl FnMut() + Send + 'static,
        offset: Duration,
    ) -> TimerHandle {
        self.items.retain(TimerHandle::is_live);
        let now = Instant::now();
        let mut deadline = now + self.delay + offset;
        if let Some(floor) = self.floor {
            if deadline <= floor {
                deadline = floor + Duration::from_millis(1);
            }
        }
        self.floor = Some(deadline);
        let handle = self.scheduler.schedule_once(deadline - now, job);
        self.items.push(handle.clone());
        handle
    }

    /// Cancels every pending callback and clears the queue.
    pub fn empty(&mut self) {
        for handle in self.items.drain(..) {
            handle.cancel();
        }
        self.floor = None;
    }

    /// True when no queued callback is still pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.items.iter().any(TimerHandle::is_live)
    }
}
