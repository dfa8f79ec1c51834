//! Element counting.

use super::{complete, fail};
use crate::error::{Result, SequenceError};
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::codec::{StateReader, StateWriter};
use crate::types::{Value, Version};
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:count";
pub(crate) const VERSION: Version = Version::V1;

/// Emits the number of elements when the source completes.
///
/// The count is a checked `i64`; overflow fails the sequence with
/// [`SequenceError::Overflow`].
pub struct Count<T> {
    source: Arc<dyn Subscribable<T>>,
}

impl<T: Value> Count<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>) -> Self {
        Self { source }
    }
}

impl<T: Value> Subscribable<i64> for Count<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<i64>>) -> Subscription {
        let op = Arc::new(CountOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            count: Mutex::new(0),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct CountOperator {
    core: OperatorCore,
    downstream: Downstream<i64>,
    count: Mutex<i64>,
}

impl Operator for CountOperator {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> Version {
        VERSION
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write(&*self.count.lock());
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        *self.count.lock() = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value> Observer<T> for CountOperator {
    fn on_next(&self, _value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        let overflowed = {
            let mut count = self.count.lock();
            match count.checked_add(1) {
                Some(next) => {
                    *count = next;
                    false
                }
                None => true,
            }
        };
        if overflowed {
            fail(&self.core, &self.downstream, SequenceError::Overflow);
        }
    }

    fn on_error(&self, error: SequenceError) {
        if self.core.accepts(NAME) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_completed(&self) {
        if !self.core.accepts(NAME) {
            return;
        }
        let count = *self.count.lock();
        self.downstream.next(count);
        complete(&self.core, &self.downstream);
    }
}
