//! # Callback Scheduler
//!
//! A single scheduler task dispatching cancellable delayed callbacks.
//!
//! Every debounce window, hold confirmation and hold-repeat period in the
//! input core is a timer. Rather than spawning one task per timer, all of
//! them run through one scheduler task driving a
//! [`tokio_util::time::DelayQueue`]; handles communicate with it over an
//! unbounded command channel.
//!
//! ## Cancellation
//!
//! Cancellation is resolved under the handle's own lock, on the firing path:
//! the scheduler takes the lock, checks the timer is still pending, marks it
//! fired and only then runs the callback. A [`TimerHandle::cancel`] that
//! completes while the timer is still pending therefore guarantees the
//! callback never runs. Cancelling an already-fired or already-cancelled
//! timer is a no-op.
//!
//! ## Usage
//!
//! ```no_run
//! use std::time::Duration;
//! use synth_bridge::timer::Scheduler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let scheduler = Scheduler::spawn();
//!     let handle = scheduler.schedule_once(Duration::from_millis(180), || {
//!         println!("debounce window elapsed");
//!     });
//!     handle.cancel(); // idempotent, safe at any point
//! }
//! ```

use std::collections::HashMap;
use std::future::poll_fn;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Poll;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::time::delay_queue::{DelayQueue, Key};
use tracing::{debug, trace};

/// A scheduled unit of work. Serialization against shared state is the job's
/// own responsibility: jobs that touch button state capture and lock the
/// owning button's mutex.
pub type Job = Box<dyn FnMut() + Send + 'static>;

/// Lifecycle of a single timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    /// Armed, will fire unless cancelled. Periodic timers stay pending
    /// across fires.
    Pending,
    /// Fired (one-shot only).
    Fired,
    /// Cancelled before firing, or stopped (periodic).
    Cancelled,
}

#[derive(Debug)]
struct TimerShared {
    state: Mutex<TimerState>,
}

impl TimerShared {
    fn state(&self) -> MutexGuard<'_, TimerState> {
        // A panicking user callback poisons nothing we care about here; the
        // state enum is always coherent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to a scheduled timer.
///
/// Clones refer to the same timer. Dropping all handles does not cancel the
/// timer; only [`TimerHandle::cancel`] does.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    id: u64,
    shared: Arc<TimerShared>,
    commands: mpsc::UnboundedSender<Command>,
}

impl TimerHandle {
    /// Cancels the timer if it has not fired yet.
    ///
    /// Idempotent: cancelling an already-fired or already-cancelled timer
    /// does nothing. For periodic timers this stops all future fires.
    pub fn cancel(&self) {
        {
            let mut state = self.shared.state();
            if *state != TimerState::Pending {
                return;
            }
            *state = TimerState::Cancelled;
        }
        trace!("Timer {} cancelled", self.id);
        // Best effort: reclaim the queue slot eagerly. The state flag above
        // is what actually prevents the fire.
        let _ = self.commands.send(Command::Cancel(self.id));
    }

    /// Returns true while the timer is armed and has neither fired nor been
    /// cancelled.
    #[must_use]
    pub fn is_live(&self) -> bool {
        *self.shared.state() == TimerState::Pending
    }
}

enum Command {
    Schedule {
        id: u64,
        delay: Duration,
        period: Option<Duration>,
        job: Job,
        shared: Arc<TimerShared>,
    },
    Cancel(u64),
}

struct Entry {
    key: Key,
    period: Option<Duration>,
    job: Job,
    shared: Arc<TimerShared>,
}

/// Handle to the scheduler task.
///
/// Cheap to clone; all clones feed the same task. The task exits once every
/// `Scheduler` and `TimerHandle` referring to it has been dropped.
#[derive(Debug, Clone)]
pub struct Scheduler {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
}

impl Scheduler {
    /// Spawns the scheduler task on the current tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_scheduler(rx));
        debug!("Callback scheduler task spawned");
        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Schedules a one-shot callback after `delay`.
    ///
    /// Scheduling never fails; if the runtime is shutting down the returned
    /// handle simply never fires.
    pub fn schedule_once(
        &self,
        delay: Duration,
        job: impl FnMut() + Send + 'static,
    ) -> TimerHandle {
        self.schedule(delay, None, Box::new(job))
    }

    /// Schedules a repeating callback with a fixed period, first fire after
    /// one full period. Runs until the handle is cancelled.
    pub fn schedule_repeating(
        &self,
        period: Duration,
        job: impl FnMut() + Send + 'static,
    ) -> TimerHandle {
        self.schedule(period, Some(period), Box::new(job))
    }

    fn schedule(&self, delay: Duration, period: Option<Duration>, job: Job) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState::Pending),
        });
        let _ = self.commands.send(Command::Schedule {
            id,
            delay,
            period,
            job,
            shared: Arc::clone(&shared),
        });
        trace!("Timer {} scheduled for {:?} (period: {:?})", id, delay, period);
        TimerHandle {
            id,
            shared,
            commands: self.commands.clone(),
        }
    }
}

async fn run_scheduler(mut rx: mpsc::UnboundedReceiver<Command>) {
    let mut queue: DelayQueue<u64> = DelayQueue::new();
    let mut entries: HashMap<u64, Entry> = HashMap::new();

    loop {
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Schedule { id, delay, period, job, shared }) => {
                    let key = queue.insert(id, delay);
                    entries.insert(id, Entry { key, period, job, shared });
                }
                Some(Command::Cancel(id)) => {
                    if let Some(entry) = entries.remove(&id) {
                        queue.try_remove(&entry.key);
                    }
                }
                None => {
                    debug!("All scheduler handles dropped, scheduler task exiting");
                    break;
                }
            },
            expired = poll_fn(|cx| match queue.poll_expired(cx) {
                Poll::Ready(Some(expired)) => Poll::Ready(expired),
                // An empty queue has nothing to fire; the command branch
                // wakes this loop when new timers arrive.
                Poll::Ready(None) | Poll::Pending => Poll::Pending,
            }) => {
                fire(expired.into_inner(), &mut queue, &mut entries);
            }
        }
    }
}

fn fire(id: u64, queue: &mut DelayQueue<u64>, entries: &mut HashMap<u64, Entry>) {
    let Some(mut entry) = entries.remove(&id) else {
        return;
    };

    // The cancel/fire decision happens under the state lock; once Fired is
    // committed a late cancel is a documented no-op.
    let run = {
        let mut state = entry.shared.state();
        match *state {
            TimerState::Pending => {
                if entry.period.is_none() {
                    *state = TimerState::Fired;
                }
                true
            }
            _ => false,
        }
    };

    if !run {
        return;
    }

    (entry.job)();

    if let Some(period) = entry.period {
        // The job itself may have cancelled the loop.
        if *entry.shared.state() == TimerState::Pending {
            entry.key = queue.insert(id, period);
            entries.insert(id, entry);
        }
    }
}
