//! Core types shared by the runtime.

use crate::error::SequenceError;
use crate::subscription::Observer;
use std::fmt;

/// Scheduler time, in ticks.
///
/// Virtual time is an arbitrary monotonic counter; the real-time scheduler
/// counts microseconds since it was created. Both absolute times and relative
/// delays are expressed in ticks.
pub type Tick = i64;

/// Bound for values flowing through a pipeline.
pub trait Value: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> Value for T {}

/// Four-part version stamped into every checkpoint block.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: i32,
    pub minor: i32,
    pub build: i32,
    pub revision: i32,
}

impl Version {
    /// `1.0.0.0`, the lowest valid operator version.
    pub const V1: Version = Version::new(1, 0, 0, 0);

    pub const fn new(major: i32, minor: i32, build: i32, revision: i32) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Whether this is a legal operator version (`>= 1.0.0.0`, no negative parts).
    pub fn is_valid(&self) -> bool {
        self.major >= 1 && self.minor >= 0 && self.build >= 0 && self.revision >= 0
    }

    /// Whether an operator at this version can read state saved at `saved`.
    ///
    /// State is readable within one major version, from the same or an older
    /// minor/build/revision.
    pub fn can_read(&self, saved: Version) -> bool {
        saved.major == self.major && saved <= *self
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// A single push notification.
///
/// A well-formed sequence is zero or more `Next` followed by at most one
/// terminal (`Error` or `Completed`).
#[derive(Clone, Debug, PartialEq)]
pub enum Notification<T> {
    Next(T),
    Error(SequenceError),
    Completed,
}

impl<T> Notification<T> {
    /// True for `Error` and `Completed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    /// Deliver this notification to an observer.
    pub fn accept(self, observer: &dyn Observer<T>) {
        match self {
            Notification::Next(value) => observer.on_next(value),
            Notification::Error(error) => observer.on_error(error),
            Notification::Completed => observer.on_completed(),
        }
    }
}

/// Lifecycle of an operator and of the subscription wrapping it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lifecycle {
    /// Constructed; no scheduler yet. Loading state is only legal here.
    Created,
    /// Context assigned; accepting notifications.
    Initialized,
    /// Terminated or unsubscribed. Final.
    Disposed,
}
