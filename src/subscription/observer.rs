//! Push contracts: observers, subscribables and the downstream handle.

use super::Subscription;
use crate::error::SequenceError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Consumer of a push sequence.
///
/// Calls follow the grammar `on_next* (on_error | on_completed)?` and are never
/// made concurrently for one observer.
pub trait Observer<T>: Send + Sync {
    fn on_next(&self, value: T);

    fn on_error(&self, error: SequenceError);

    fn on_completed(&self);
}

/// Re-subscribable factory for a push sequence.
///
/// Each call builds a fresh operator topology delivering into `observer` and
/// returns the root of its subscription tree. The tree is inert until it is
/// initialized through a [`SubscriptionVisitor`](super::SubscriptionVisitor).
pub trait Subscribable<T>: Send + Sync {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription;
}

impl<T, S> Subscribable<T> for Arc<S>
where
    S: Subscribable<T> + ?Sized,
{
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        (**self).subscribe(observer)
    }
}

/// An operator's handle to its single downstream observer.
///
/// At most one terminal notification passes through: `error` and `completed`
/// detach the observer before calling it. The observer is invoked without any
/// lock held.
pub struct Downstream<T> {
    observer: Mutex<Option<Arc<dyn Observer<T>>>>,
}

impl<T> Downstream<T> {
    pub fn new(observer: Arc<dyn Observer<T>>) -> Self {
        Self {
            observer: Mutex::new(Some(observer)),
        }
    }

    pub fn next(&self, value: T) {
        let observer = self.observer.lock().clone();
        if let Some(observer) = observer {
            observer.on_next(value);
        }
    }

    /// Forward a terminal error. Returns false if a terminal already went out.
    pub fn error(&self, error: SequenceError) -> bool {
        let observer = self.observer.lock().take();
        match observer {
            Some(observer) => {
                observer.on_error(error);
                true
            }
            None => false,
        }
    }

    /// Forward completion. Returns false if a terminal already went out.
    pub fn completed(&self) -> bool {
        let observer = self.observer.lock().take();
        match observer {
            Some(observer) => {
                observer.on_completed();
                true
            }
            None => false,
        }
    }

    /// Drop the observer without notifying it.
    pub fn release(&self) {
        self.observer.lock().take();
    }

    pub fn is_attached(&self) -> bool {
        self.observer.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Notification;

    #[derive(Default)]
    struct Collect(Mutex<Vec<Notification<i32>>>);

    impl Observer<i32> for Collect {
        fn on_next(&self, value: i32) {
            self.0.lock().push(Notification::Next(value));
        }

        fn on_error(&self, error: SequenceError) {
            self.0.lock().push(Notification::Error(error));
        }

        fn on_completed(&self) {
            self.0.lock().push(Notification::Completed);
        }
    }

    #[test]
    fn test_single_terminal() {
        let sink = Arc::new(Collect::default());
        let downstream = Downstream::new(sink.clone());

        downstream.next(1);
        assert!(downstream.completed());
        assert!(!downstream.error(SequenceError::Overflow));
        assert!(!downstream.completed());
        downstream.next(2);

        assert_eq!(
            *sink.0.lock(),
            vec![Notification::Next(1), Notification::Completed]
        );
        assert!(!downstream.is_attached());
    }

    #[test]
    fn test_release_is_silent() {
        let sink = Arc::new(Collect::default());
        let downstream = Downstream::new(sink.clone());
        downstream.release();
        downstream.next(1);
        assert!(!downstream.completed());
        assert!(sink.0.lock().is_empty());
    }
}
