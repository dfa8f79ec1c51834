//! Virtual-time test harness.
//!
//! Sources replay recorded notifications on a [`VirtualTimeScheduler`] and a
//! [`TestObserver`] records what reaches the end of the pipeline, each with
//! the tick it happened at. Sources also log every subscription's live
//! interval. [`TestRun`] adds checkpoint save and load points to the same
//! timeline.
//!
//! ```ignore
//! let scheduler = TestScheduler::new();
//! let xs = scheduler.create_cold_observable(vec![on_next(10, 2), on_completed(50)]);
//! let results = scheduler.start(move || xs.clone().count())?;
//! assert_eq!(results.messages(), vec![on_next(250, 1), on_completed(250)]);
//! ```
//!
//! [`VirtualTimeScheduler`]: crate::scheduler::VirtualTimeScheduler

mod observable;
mod observer;
mod scheduler;

pub use observable::{ColdObservable, HotObservable};
pub use observer::TestObserver;
pub use scheduler::{TestRun, TestScheduler, CREATED, DISPOSED, SUBSCRIBED};

use crate::error::SequenceError;
use crate::types::{Notification, Tick};

/// A value stamped with the virtual time it was observed at.
#[derive(Clone, Debug, PartialEq)]
pub struct Recorded<V> {
    pub time: Tick,
    pub value: V,
}

impl<V> Recorded<V> {
    pub fn new(time: Tick, value: V) -> Self {
        Self { time, value }
    }
}

/// Live interval of one subscription to a test source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionLog {
    pub subscribe: Tick,
    /// `Tick::MAX` while still subscribed.
    pub unsubscribe: Tick,
}

impl SubscriptionLog {
    pub fn new(subscribe: Tick, unsubscribe: Tick) -> Self {
        Self {
            subscribe,
            unsubscribe,
        }
    }

    pub fn is_open(&self) -> bool {
        self.unsubscribe == Tick::MAX
    }
}

pub fn on_next<T>(time: Tick, value: T) -> Recorded<Notification<T>> {
    Recorded::new(time, Notification::Next(value))
}

pub fn on_error<T>(time: Tick, error: SequenceError) -> Recorded<Notification<T>> {
    Recorded::new(time, Notification::Error(error))
}

pub fn on_completed<T>(time: Tick) -> Recorded<Notification<T>> {
    Recorded::new(time, Notification::Completed)
}

/// Subscription interval `[subscribe, unsubscribe)`.
pub fn subscribed(subscribe: Tick, unsubscribe: Tick) -> SubscriptionLog {
    SubscriptionLog::new(subscribe, unsubscribe)
}
