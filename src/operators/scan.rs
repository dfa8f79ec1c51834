//! Running folds.

use super::{complete, fail, Accumulator};
use crate::codec::{Persist, StateReader, StateWriter};
use crate::error::{Result, SequenceError};
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Value, Version};
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:scan";
pub(crate) const SEED_NAME: &str = "rx:scan/seed";
pub(crate) const VERSION: Version = Version::V1;
pub(crate) const SEED_VERSION: Version = Version::V1;

/// Emits every intermediate accumulator; the first element is the initial
/// accumulator.
pub struct Scan<T> {
    source: Arc<dyn Subscribable<T>>,
    accumulator: Accumulator<T, T>,
}

impl<T: Value + Persist> Scan<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>, accumulator: Accumulator<T, T>) -> Self {
        Self {
            source,
            accumulator,
        }
    }
}

impl<T: Value + Persist> Subscribable<T> for Scan<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let op = Arc::new(ScanOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            accumulator: Arc::clone(&self.accumulator),
            accumulated: Mutex::new(None),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct ScanOperator<T> {
    core: OperatorCore,
    downstream: Downstream<T>,
    accumulator: Accumulator<T, T>,
    accumulated: Mutex<Option<T>>,
}

impl<T: Value + Persist> Operator for ScanOperator<T> {
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

impl<T: Value + Persist> Observer<T> for ScanOperator<T> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        let result = {
            let mut accumulated = self.accumulated.lock();
            let next = match accumulated.take() {
                None => Ok(value),
                Some(current) => (self.accumulator)(current, value),
            };
            if let Ok(next) = &next {
                *accumulated = Some(next.clone());
            }
            next
        };
        match result {
            Ok(next) => self.downstream.next(next),
            Err(error) => fail(&self.core, &self.downstream, error),
        }
    }

    fn on_error(&self, error: SequenceError) {
        if self.core.accepts(NAME) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_completed(&self) {
        if self.core.accepts(NAME) {
            complete(&self.core, &self.downstream);
        }
    }
}

/// Emits every intermediate accumulator, starting from a seed.
pub struct ScanSeed<T, A> {
    source: Arc<dyn Subscribable<T>>,
    seed: A,
    accumulator: Accumulator<A, T>,
}

impl<T: Value, A: Value + Persist> ScanSeed<T, A> {
    pub fn new(source: Arc<dyn Subscribable<T>>, seed: A, accumulator: Accumulator<A, T>) -> Self {
        Self {
            source,
            seed,
            accumulator,
        }
    }
}

impl<T: Value, A: Value + Persist> Subscribable<A> for ScanSeed<T, A> {
    fn subscribe(&self, observer: Arc<dyn Observer<A>>) -> Subscription {
        let op = Arc::new(ScanSeedOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            accumulator: Arc::clone(&self.accumulator),
            accumulated: Mutex::new(self.seed.clone()),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct ScanSeedOperator<T, A> {
    core: OperatorCore,
    downstream: Downstream<A>,
    accumulator: Accumulator<A, T>,
    accumulated: Mutex<A>,
}

impl<T: Value, A: Value + Persist> Operator for ScanSeedOperator<T, A> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        SEED_NAME
    }

    fn version(&self) -> Version {
        SEED_VERSION
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

impl<T: Value, A: Value + Persist> Observer<T> for ScanSeedOperator<T, A> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(SEED_NAME) {
            return;
        }
        let result = {
            let mut accumulated = self.accumulated.lock();
            let next = (self.accumulator)(accumulated.clone(), value);
            if let Ok(next) = &next {
                *accumulated = next.clone();
            }
            next
        };
        match result {
            Ok(next) => self.downstream.next(next),
            Err(error) => fail(&self.core, &self.downstream, error),
        }
    }

    fn on_error(&self, error: SequenceError) {
        if self.core.accepts(SEED_NAME) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_completed(&self) {
        if self.core.accepts(SEED_NAME) {
            complete(&self.core, &self.downstream);
        }
    }
}
