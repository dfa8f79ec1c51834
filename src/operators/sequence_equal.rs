//! Pairwise comparison of two sequences.

use super::{complete, fail, Comparer};
use crate::codec::{Persist, StateReader, StateWriter};
use crate::error::{Result, SequenceError};
use crate::settings::keys;
use crate::subscription::{
    Downstream, Observer, Operator, OperatorContext, OperatorCore, Subscribable, Subscription,
};
use crate::types::{Value, Version};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:sequence-equal";
pub(crate) const VERSION: Version = Version::V1;

/// Emits `true` if both sequences produce equal elements in the same order
/// and complete; `false` as soon as a difference is known.
///
/// Elements that arrive on one side before their counterpart are queued,
/// bounded per side by [`keys::MAX_QUEUE_SIZE`].
pub struct SequenceEqual<T> {
    left: Arc<dyn Subscribable<T>>,
    right: Arc<dyn Subscribable<T>>,
    comparer: Comparer<T>,
}

impl<T: Value + Persist> SequenceEqual<T> {
    pub fn new(
        left: Arc<dyn Subscribable<T>>,
        right: Arc<dyn Subscribable<T>>,
        comparer: Comparer<T>,
    ) -> Self {
        Self {
            left,
            right,
            comparer,
        }
    }
}

impl<T: Value + Persist> Subscribable<bool> for SequenceEqual<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<bool>>) -> Subscription {
        let op = Arc::new(SequenceEqualOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            comparer: Arc::clone(&self.comparer),
            max_queue: Mutex::new(usize::MAX),
            state: Mutex::new(CompareState {
                left: SideState::default(),
                right: SideState::default(),
            }),
        });
        let left = self.left.subscribe(Arc::new(SideInput {
            parent: Arc::clone(&op),
            side: Side::Left,
        }));
        let right = self.right.subscribe(Arc::new(SideInput {
            parent: Arc::clone(&op),
            side: Side::Right,
        }));
        Subscription::new(op, vec![left, right])
    }
}

#[derive(Clone, Copy, Debug)]
enum Side {
    Left,
    Right,
}

struct SideState<T> {
    queue: VecDeque<T>,
    done: bool,
}

impl<T> Default for SideState<T> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            done: false,
        }
    }
}

struct CompareState<T> {
    left: SideState<T>,
    right: SideState<T>,
}

impl<T> CompareState<T> {
    /// `(this side, other side)`.
    fn sides(&mut self, side: Side) -> (&mut SideState<T>, &mut SideState<T>) {
        match side {
            Side::Left => (&mut self.left, &mut self.right),
            Side::Right => (&mut self.right, &mut self.left),
        }
    }
}

enum Outcome {
    Pending,
    Verdict(bool),
    Failed(SequenceError),
}

struct SequenceEqualOperator<T> {
    core: OperatorCore,
    downstream: Downstream<bool>,
    comparer: Comparer<T>,
    max_queue: Mutex<usize>,
    state: Mutex<CompareState<T>>,
}

impl<T: Value + Persist> SequenceEqualOperator<T> {
    fn next(&self, side: Side, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        let max_queue = *self.max_queue.lock();
        let outcome = {
            let mut state = self.state.lock();
            let (mine, theirs) = state.sides(side);
            if let Some(other) = theirs.queue.pop_front() {
                let equal = match side {
                    Side::Left => (self.comparer)(&value, &other),
                    Side::Right => (self.comparer)(&other, &value),
                };
                match equal {
                    Ok(true) => Outcome::Pending,
                    Ok(false) => Outcome::Verdict(false),
                    Err(error) => Outcome::Failed(error),
                }
            } else if theirs.done {
                Outcome::Verdict(false)
            } else {
                mine.queue.push_back(value);
                if mine.queue.len() > max_queue {
                    Outcome::Failed(SequenceError::exhausted(keys::MAX_QUEUE_SIZE, max_queue))
                } else {
                    Outcome::Pending
                }
            }
        };
        self.settle(outcome);
    }

    fn completed(&self, side: Side) {
        if !self.core.accepts(NAME) {
            return;
        }
        let outcome = {
            let mut state = self.state.lock();
            let (mine, theirs) = state.sides(side);
            mine.done = true;
            if !theirs.queue.is_empty() {
                Outcome::Verdict(false)
            } else if theirs.done {
                Outcome::Verdict(mine.queue.is_empty())
            } else {
                Outcome::Pending
            }
        };
        self.settle(outcome);
    }

    fn error(&self, error: SequenceError) {
        if self.core.accepts(NAME) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn settle(&self, outcome: Outcome) {
        match outcome {
            Outcome::Pending => {}
            Outcome::Verdict(equal) => {
                self.downstream.next(equal);
                complete(&self.core, &self.downstream);
            }
            Outcome::Failed(error) => fail(&self.core, &self.downstream, error),
        }
    }
}

impl<T: Value + Persist> Operator for SequenceEqualOperator<T> {
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
        *self.max_queue.lock() = context.settings().limit(keys::MAX_QUEUE_SIZE)?;
        Ok(())
    }

    fn save_state(&self, writer: &mut StateWriter) {
        let state = self.state.lock();
        writer.write(&state.left.queue);
        writer.write(&state.left.done);
        writer.write(&state.right.queue);
        writer.write(&state.right.done);
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        let mut state = self.state.lock();
        state.left.queue = reader.read()?;
        state.left.done = reader.read()?;
        state.right.queue = reader.read()?;
        state.right.done = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

struct SideInput<T> {
    parent: Arc<SequenceEqualOperator<T>>,
    side: Side,
}

impl<T: Value + Persist> Observer<T> for SideInput<T> {
    fn on_next(&self, value: T) {
        self.parent.next(self.side, value);
    }

    fn on_error(&self, error: SequenceError) {
        self.parent.error(error);
    }

    fn on_completed(&self) {
        self.parent.completed(self.side);
    }
}
