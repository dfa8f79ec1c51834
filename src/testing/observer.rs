use super::Recorded;
use crate::error::SequenceError;
use crate::scheduler::{Scheduler, VirtualTimeScheduler};
use crate::subscription::Observer;
use crate::types::{Notification, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// Observer that records every notification with the scheduler clock.
pub struct TestObserver<T> {
    scheduler: Arc<VirtualTimeScheduler>,
    messages: Mutex<Vec<Recorded<Notification<T>>>>,
}

impl<T: Value> TestObserver<T> {
    pub fn new(scheduler: Arc<VirtualTimeScheduler>) -> Self {
        Self {
            scheduler,
            messages: Mutex::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<Recorded<Notification<T>>> {
        self.messages.lock().clone()
    }

    /// Values of the `Next` notifications, in order.
    pub fn values(&self) -> Vec<T> {
        self.messages
            .lock()
            .iter()
            .filter_map(|m| match &m.value {
                Notification::Next(value) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, notification: Notification<T>) {
        let time = self.scheduler.now();
        self.messages.lock().push(Recorded::new(time, notification));
    }
}

impl<T: Value> Observer<T> for TestObserver<T> {
    fn on_next(&self, value: T) {
        self.record(Notification::Next(value));
    }

    fn on_error(&self, error: SequenceError) {
        self.record(Notification::Error(error));
    }

    fn on_completed(&self) {
        self.record(Notification::Completed);
    }
}
