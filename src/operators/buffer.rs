//! Count-based buffers.

use super::{complete, fail};
use crate::codec::{Persist, StateReader, StateWriter};
use crate::error::{Result, RxError, SequenceError};
use crate::settings::keys;
use crate::subscription::{
    Downstream, Observer, Operator, OperatorContext, OperatorCore, Subscribable, Subscription,
};
use crate::types::{Value, Version};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:buffer/count";
pub(crate) const VERSION: Version = Version::V1;

/// Groups elements into buffers of `count`, opening a new buffer every
/// `skip` elements.
///
/// With `skip < count` buffers overlap; with `skip > count` elements between
/// buffers are dropped. On completion the remaining non-empty buffers are
/// emitted oldest first. Bounded by [`keys::MAX_BUFFER_COUNT`] (open buffers)
/// and [`keys::MAX_BUFFER_SIZE`] (elements in one buffer).
pub struct Buffer<T> {
    source: Arc<dyn Subscribable<T>>,
    count: usize,
    skip: usize,
}

impl<T: Value + Persist> Buffer<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>, count: usize, skip: usize) -> Result<Self> {
        if count == 0 {
            return Err(RxError::invalid_argument("count", "must be positive"));
        }
        if skip == 0 {
            return Err(RxError::invalid_argument("skip", "must be positive"));
        }
        Ok(Self {
            source,
            count,
            skip,
        })
    }
}

impl<T: Value + Persist> Subscribable<Vec<T>> for Buffer<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<Vec<T>>>) -> Subscription {
        let op = Arc::new(BufferOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            count: self.count,
            skip: self.skip,
            limits: Mutex::new(Limits {
                max_buffers: usize::MAX,
                max_size: usize::MAX,
            }),
            state: Mutex::new(BufferState {
                index: 0,
                buffers: VecDeque::new(),
            }),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct Limits {
    max_buffers: usize,
    max_size: usize,
}

struct BufferState<T> {
    /// Elements seen so far.
    index: u64,
    /// Open buffers, oldest first.
    buffers: VecDeque<Vec<T>>,
}

struct BufferOperator<T> {
    core: OperatorCore,
    downstream: Downstream<Vec<T>>,
    count: usize,
    skip: usize,
    limits: Mutex<Limits>,
    state: Mutex<BufferState<T>>,
}

enum Step<T> {
    Emit(Option<Vec<T>>),
    Exhausted(&'static str, usize),
}

impl<T: Value + Persist> Operator for BufferOperator<T> {
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
        let settings = context.settings();
        let mut limits = self.limits.lock();
        limits.max_buffers = settings.limit(keys::MAX_BUFFER_COUNT)?;
        limits.max_size = settings.limit(keys::MAX_BUFFER_SIZE)?;
        Ok(())
    }

    fn save_state(&self, writer: &mut StateWriter) {
        let state = self.state.lock();
        writer.write(&state.index);
        writer.write(&state.buffers);
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        let mut state = self.state.lock();
        state.index = reader.read()?;
        state.buffers = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value + Persist> Observer<T> for BufferOperator<T> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        let (max_buffers, max_size) = {
            let limits = self.limits.lock();
            (limits.max_buffers, limits.max_size)
        };

        let step = {
            let mut state = self.state.lock();
            if state.index % self.skip as u64 == 0 {
                state.buffers.push_back(Vec::new());
            }
            state.index += 1;

            if state.buffers.len() > max_buffers {
                Step::Exhausted(keys::MAX_BUFFER_COUNT, max_buffers)
            } else {
                let mut oversized = false;
                for buffer in state.buffers.iter_mut() {
                    buffer.push(value.clone());
                    oversized |= buffer.len() > max_size;
                }
                if oversized {
                    Step::Exhausted(keys::MAX_BUFFER_SIZE, max_size)
                } else if state.buffers.front().map_or(false, |b| b.len() == self.count) {
                    Step::Emit(state.buffers.pop_front())
                } else {
                    Step::Emit(None)
                }
            }
        };

        match step {
            Step::Emit(Some(buffer)) => self.downstream.next(buffer),
            Step::Emit(None) => {}
            Step::Exhausted(setting, limit) => fail(
                &self.core,
                &self.downstream,
                SequenceError::exhausted(setting, limit),
            ),
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
        let remaining = std::mem::take(&mut self.state.lock().buffers);
        for buffer in remaining {
            if !buffer.is_empty() {
                self.downstream.next(buffer);
            }
        }
        complete(&self.core, &self.downstream);
    }
}
