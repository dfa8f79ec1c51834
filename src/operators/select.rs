//! Projection.

use super::{complete, fail, Selector};
use crate::error::SequenceError;
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Value, Version};
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:select";
pub(crate) const VERSION: Version = Version::V1;

/// Applies a selector to every element.
pub struct Select<T, R> {
    source: Arc<dyn Subscribable<T>>,
    selector: Selector<T, R>,
}

impl<T: Value, R: Value> Select<T, R> {
    pub fn new(source: Arc<dyn Subscribable<T>>, selector: Selector<T, R>) -> Self {
        Self { source, selector }
    }
}

impl<T: Value, R: Value> Subscribable<R> for Select<T, R> {
    fn subscribe(&self, observer: Arc<dyn Observer<R>>) -> Subscription {
        let op = Arc::new(SelectOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            selector: Arc::clone(&self.selector),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct SelectOperator<T, R> {
    core: OperatorCore,
    downstream: Downstream<R>,
    selector: Selector<T, R>,
}

impl<T: Value, R: Value> Operator for SelectOperator<T, R> {
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

impl<T: Value, R: Value> Observer<T> for SelectOperator<T, R> {
    fn on_next(&self, value: T) {
        if !self.core.accepts(NAME) {
            return;
        }
        match (self.selector)(value) {
            Ok(projected) => self.downstream.next(projected),
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
