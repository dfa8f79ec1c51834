//! Folds to a single result.
//!
//! The unseeded form starts from the first element and fails with
//! [`SequenceError::EmptySequence`] when the source completes without one.
//! The seeded forms emit the seed (through the result selector, if any) for
//! an empty source. A failing accumulator or selector terminates the sequence
//! immediately; the partial accumulator is discarded.

use super::{complete, fail, Accumulator, Selector};
use crate::codec::{Persist, StateReader, StateWriter};
use crate::error::{Result, SequenceError, SequenceResult};
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Value, Version};
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:aggregate";
pub(crate) const SEED_NAME: &str = "rx:aggregate/seed";
pub(crate) const SEED_RESULT_NAME: &str = "rx:aggregate/seed-result";
pub(crate) const VERSION: Version = Version::V1;
pub(crate) const SEED_VERSION: Version = Version::V1;

/// Unseeded fold.
pub struct Aggregate<T> {
    source: Arc<dyn Subscribable<T>>,
    accumulator: Accumulator<T, T>,
}

impl<T: Value + Persist> Aggregate<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>, accumulator: Accumulator<T, T>) -> Self {
        Self {
            source,
            accumulator,
        }
    }
}

impl<T: Value + Persist> Subscribable<T> for Aggregate<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let op = Arc::new(AggregateOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            accumulator: Arc::clone(&self.accumulator),
            accumulated: Mutex::new(None),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct AggregateOperator<T> {
    core: OperatorCore,
    downstream: Downstream<T>,
    accumulator: Accumulator<T, T>,
    /// `None` until the first element arrives.
    accumulated: Mutex<Option<T>>,
}

impl<T: Value + Persist> Operator for AggregateOperator<T> {
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
        writer.write(&*self.accumulated.lock());
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        *self.accumulated.lock() = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value + Persist> Observer<T> for AggregateOperator<T> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        let failure = {
            let mut accumulated = self.accumulated.lock();
            match accumulated.take() {
                None => {
                    *accumulated = Some(value);
                    None
                }
                Some(current) => match (self.accumulator)(current, value) {
                    Ok(next) => {
                        *accumulated = Some(next);
                        None
                    }
                    Err(error) => Some(error),
                },
            }
        };
        if let Some(error) = failure {
            fail(&self.core, &self.downstream, error);
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
        let result = self.accumulated.lock().take();
        match result {
            Some(value) => {
                self.downstream.next(value);
                complete(&self.core, &self.downstream);
            }
            None => fail(&self.core, &self.downstream, SequenceError::EmptySequence),
        }
    }
}

/// Seeded fold with an optional result selector.
pub struct AggregateSeed<T, A, R> {
    name: &'static str,
    source: Arc<dyn Subscribable<T>>,
    seed: A,
    accumulator: Accumulator<A, T>,
    result: Selector<A, R>,
}

impl<T: Value, A: Value + Persist> AggregateSeed<T, A, A> {
    pub fn new(source: Arc<dyn Subscribable<T>>, seed: A, accumulator: Accumulator<A, T>) -> Self {
        Self {
            name: SEED_NAME,
            source,
            seed,
            accumulator,
            result: Arc::new(|accumulated: A| -> SequenceResult<A> { Ok(accumulated) }),
        }
    }
}

impl<T: Value, A: Value + Persist, R: Value> AggregateSeed<T, A, R> {
    pub fn with_result(
        source: Arc<dyn Subscribable<T>>,
        seed: A,
        accumulator: Accumulator<A, T>,
        result: Selector<A, R>,
    ) -> Self {
        Self {
            name: SEED_RESULT_NAME,
            source,
            seed,
            accumulator,
            result,
        }
    }
}

impl<T: Value, A: Value + Persist, R: Value> Subscribable<R> for AggregateSeed<T, A, R> {
    fn subscribe(&self, observer: Arc<dyn Observer<R>>) -> Subscription {
        let op = Arc::new(AggregateSeedOperator {
            name: self.name,
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            accumulator: Arc::clone(&self.accumulator),
            result: Arc::clone(&self.result),
            accumulated: Mutex::new(Some(self.seed.clone())),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct AggregateSeedOperator<T, A, R> {
    name: &'static str,
    core: OperatorCore,
    downstream: Downstream<R>,
    accumulator: Accumulator<A, T>,
    result: Selector<A, R>,
    /// Only `None` transiently, after a failed fold.
    accumulated: Mutex<Option<A>>,
}

impl<T: Value, A: Value + Persist, R: Value> Operator for AggregateSeedOperator<T, A, R> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> Version {
        SEED_VERSION
    }

    fn save_state(&self, writer: &mut StateWriter) {
        if let Some(accumulated) = &*self.accumulated.lock() {
            writer.write(accumulated);
        }
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        *self.accumulated.lock() = Some(reader.read()?);
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value, A: Value + Persist, R: Value> Observer<T> for AggregateSeedOperator<T, A, R> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(self.name) {
            return;
        }
        let failure = {
            let mut accumulated = self.accumulated.lock();
            match accumulated.take() {
                Some(current) => match (self.accumulator)(current, value) {
                    Ok(next) => {
                        *accumulated = Some(next);
                        None
                    }
                    Err(error) => Some(error),
                },
                None => None,
            }
        };
        if let Some(error) = failure {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_error(&self, error: SequenceError) {
        if self.core.accepts(self.name) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_completed(&self) {
        if !self.core.accepts(self.name) {
            return;
        }
        let accumulated = self.accumulated.lock().take();
        let Some(accumulated) = accumulated else {
            return;
        };
        match (self.result)(accumulated) {
            Ok(result) => {
                self.downstream.next(result);
                complete(&self.core, &self.downstream);
            }
            Err(error) => fail(&self.core, &self.downstream, error),
        }
    }
}
