//! # Timing Primitives
//!
//! Cancellable delayed callbacks for the input event core.
//!
//! | Type | Role |
//! |------|------|
//! | [`Scheduler`] | Single task dispatching all timers via a delay queue |
//! | [`TimerHandle`] | Cancel or inspect one scheduled callback |
//! | [`CallbackQueue`] | Group of callbacks with a shared delay and bulk cancel |

mod queue;
mod scheduler;

pub use queue::CallbackQueue;
pub use scheduler::{Job, Scheduler, TimerHandle};
