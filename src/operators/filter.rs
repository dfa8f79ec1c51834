//! Filtering.

use super::{complete, fail, Predicate};
use crate::error::SequenceError;
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Value, Version};
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:where";
pub(crate) const VERSION: Version = Version::V1;

/// Passes through the elements a predicate accepts.
pub struct Filter<T> {
    source: Arc<dyn Subscribable<T>>,
    predicate: Predicate<T>,
}

impl<T: Value> Filter<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>, predicate: Predicate<T>) -> Self {
        Self { source, predicate }
    }
}

impl<T: Value> Subscribable<T> for Filter<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let op = Arc::new(FilterOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            predicate: Arc::clone(&self.predicate),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct FilterOperator<T> {
    core: OperatorCore,
    downstream: Downstream<T>,
    predicate: Predicate<T>,
}

impl<T: Value> Operator for FilterOperator<T> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        NAME
    }

    fn version(&self) -> Version {
        VERSION
    }

    fn is_stateful(&self) -> bool {
        false
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value> Observer<T> for FilterOperator<T> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        match (self.predicate)(&value) {
            Ok(true) => self.downstream.next(value),
            Ok(false) => {}
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
