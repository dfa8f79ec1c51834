//! Collect into a list.

use super::{complete, fail};
use crate::codec::{Persist, StateReader, StateWriter};
use crate::error::{Result, SequenceError};
use crate::settings::keys;
use crate::subscription::{
    Downstream, Observer, Operator, OperatorContext, OperatorCore, Subscribable, Subscription,
};
use crate::types::{Value, Version};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:to-list";
pub(crate) const VERSION: Version = Version::V1;

/// Emits every element as one list when the source completes. Bounded by
/// [`keys::MAX_LIST_SIZE`].
pub struct ToList<T> {
    source: Arc<dyn Subscribable<T>>,
}

impl<T: Value + Persist> ToList<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>) -> Self {
        Self { source }
    }
}

impl<T: Value + Persist> Subscribable<Vec<T>> for ToList<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<Vec<T>>>) -> Subscription {
        let op = Arc::new(ToListOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            max_size: AtomicUsize::new(usize::MAX),
            list: Mutex::new(Vec::new()),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct ToListOperator<T> {
    core: OperatorCore,
    downstream: Downstream<Vec<T>>,
    max_size: AtomicUsize,
    list: Mutex<Vec<T>>,
}

impl<T: Value + Persist> Operator for ToListOperator<T> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> Version {
        VERSION
    }

    fn on_context(&self, context: &OperatorContext) -> Result<()> {
        let max_size = context.settings().limit(keys::MAX_LIST_SIZE)?;
        self.max_size.store(max_size, Ordering::SeqCst);
        Ok(())
    }

    fn save_state(&self, writer: &mut StateWriter) {
        writer.write(&*self.list.lock());
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        *self.list.lock() = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value + Persist> Observer<T> for ToListOperator<T> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        let max_size = self.max_size.load(Ordering::SeqCst);
        let exceeded = {
            let mut list = self.list.lock();
            list.push(value);
            list.len() > max_size
        };
        if exceeded {
            fail(
                &self.core,
                &self.downstream,
                SequenceError::exhausted(keys::MAX_LIST_SIZE, max_size),
            );
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
        let list = std::mem::take(&mut *self.list.lock());
        self.downstream.next(list);
        complete(&self.core, &self.downstream);
    }
}
