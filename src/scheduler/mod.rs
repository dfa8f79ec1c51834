//! Time-ordered action scheduling.
//!
//! Two implementations share the [`Scheduler`] contract:
//! - [`VirtualTimeScheduler`] runs queued actions deterministically, advancing
//!   a virtual clock without real delay.
//! - [`RealTimeScheduler`] dispatches on a dedicated thread against the wall
//!   clock.
//!
//! Both order actions by `(due, sequence)`: for equal due times, the action
//! scheduled first runs first. Actions never overlap.

mod queue;
mod real_time;
mod virtual_time;

pub use queue::{ActionQueue, ScheduledEntry};
pub use real_time::{RealTimeScheduler, TICKS_PER_MILLISECOND, TICKS_PER_SECOND};
pub use virtual_time::VirtualTimeScheduler;

use crate::types::Tick;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Work item run by a scheduler.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Scheduler contract shared by virtual and real time.
pub trait Scheduler: Send + Sync {
    /// Current time.
    fn now(&self) -> Tick;

    /// Run `action` at `due`. Times in the past run as soon as possible.
    fn schedule_absolute(&self, due: Tick, action: Action) -> ScheduledTask;

    /// Run `action` after `delay` ticks. Negative delays are treated as zero.
    fn schedule_relative(&self, delay: Tick, action: Action) -> ScheduledTask {
        let due = self.now().saturating_add(delay.max(0));
        self.schedule_absolute(due, action)
    }
}

/// Handle to a scheduled action.
///
/// Cancelling is idempotent; a cancelled action is skipped when its turn comes.
#[derive(Clone, Debug)]
pub struct ScheduledTask {
    due: Tick,
    sequence: u64,
    cancelled: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub(crate) fn new(due: Tick, sequence: u64) -> Self {
        Self {
            due,
            sequence,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn due(&self) -> Tick {
        self.due
    }

    /// Insertion order within the owning scheduler.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub(crate) fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}
