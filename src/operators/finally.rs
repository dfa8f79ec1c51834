//! Cleanup on dispose.

use super::{complete, fail};
use crate::error::SequenceError;
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Value, Version};
use std::sync::Arc;

pub(crate) const NAME: &str = "rx:finally";
pub(crate) const VERSION: Version = Version::V1;

/// Runs an action exactly once per subscription, when it is disposed after
/// an error, after completion, or by the subscriber.
pub struct Finally<T> {
    source: Arc<dyn Subscribable<T>>,
    action: Arc<dyn Fn() + Send + Sync>,
}

impl<T: Value> Finally<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>, action: Arc<dyn Fn() + Send + Sync>) -> Self {
        Self { source, action }
    }
}

impl<T: Value> Subscribable<T> for Finally<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let op = Arc::new(FinallyOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            action: Arc::clone(&self.action),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct FinallyOperator<T> {
    core: OperatorCore,
    downstream: Downstream<T>,
    action: Arc<dyn Fn() + Send + Sync>,
}

impl<T: Value> Operator for FinallyOperator<T> {
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
        (self.action)();
    }
}

impl<T: Value> Observer<T> for FinallyOperator<T> {
    fn on_next(&self, value: T) {
        if self.core.accepts(NAME) {
            self.downstream.next(value);
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
