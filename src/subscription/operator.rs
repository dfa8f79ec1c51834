//! Operator state machine.

use super::node::Node;
use super::Subscription;
use crate::codec::{StateReader, StateWriter};
use crate::error::Result;
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::types::{Lifecycle, Version};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

/// Scheduler and settings shared by every operator in a tree.
#[derive(Clone)]
pub struct OperatorContext {
    scheduler: Arc<dyn Scheduler>,
    settings: Arc<Settings>,
    instance_id: Option<String>,
}

impl OperatorContext {
    pub fn new(scheduler: Arc<dyn Scheduler>, settings: Arc<Settings>) -> Self {
        Self {
            scheduler,
            settings,
            instance_id: None,
        }
    }

    /// Tag the context with the id of the hosted instance it belongs to.
    pub fn with_instance_id(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }
}

impl fmt::Debug for OperatorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorContext")
            .field("now", &self.scheduler.now())
            .field("settings", &self.settings)
            .field("instance_id", &self.instance_id)
            .finish()
    }
}

/// A resumable stage of a pipeline.
///
/// Lifecycle: `Created -> Initialized -> Disposed`. State may only be loaded
/// while `Created`; notifications are only accepted while `Initialized`.
/// Implementations never hold their own state lock while calling downstream
/// or disposing.
pub trait Operator: Send + Sync {
    fn core(&self) -> &OperatorCore;

    /// Checkpoint block name. Unique across operator kinds.
    fn name(&self) -> &'static str;

    /// State format version, `>= 1.0.0.0`.
    fn version(&self) -> Version {
        Version::V1
    }

    /// Whether this operator has fields to checkpoint. Stateless operators
    /// still write a header-only block carrying their lifecycle.
    fn is_stateful(&self) -> bool {
        true
    }

    /// Called once with the context, before any notification flows.
    /// Settings are read here.
    fn on_context(&self, _context: &OperatorContext) -> Result<()> {
        Ok(())
    }

    /// Called after every operator in the tree has its context. Timers and
    /// source registrations start here.
    fn on_start(&self) {}

    fn save_state(&self, _writer: &mut StateWriter) {}

    /// Restore fields written by `save_state` at `version`.
    fn load_state(&self, _reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        Ok(())
    }

    /// Release resources: cancel timers, drop the downstream. Runs once.
    fn on_dispose(&self) {}
}

/// Lifecycle bookkeeping embedded in every operator.
pub struct OperatorCore {
    lifecycle: Mutex<Lifecycle>,
    context: OnceLock<OperatorContext>,
    node: OnceLock<Weak<Node>>,
}

impl OperatorCore {
    pub fn new() -> Self {
        Self {
            lifecycle: Mutex::new(Lifecycle::Created),
            context: OnceLock::new(),
            node: OnceLock::new(),
        }
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.lock()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle() == Lifecycle::Initialized
    }

    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }

    pub fn context(&self) -> Option<&OperatorContext> {
        self.context.get()
    }

    pub fn scheduler(&self) -> Option<&Arc<dyn Scheduler>> {
        self.context.get().map(OperatorContext::scheduler)
    }

    /// Assign the context and move to `Initialized`.
    ///
    /// # Panics
    ///
    /// If a context was already assigned.
    pub fn set_context(&self, context: OperatorContext) {
        assert!(
            self.context.set(context).is_ok(),
            "operator context assigned more than once"
        );
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle == Lifecycle::Created {
            *lifecycle = Lifecycle::Initialized;
        }
    }

    /// Move to `Disposed`. True only for the first call.
    pub fn begin_dispose(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if *lifecycle == Lifecycle::Disposed {
            return false;
        }
        *lifecycle = Lifecycle::Disposed;
        true
    }

    /// Dispose the subscription wrapping this operator, upstream included.
    pub fn dispose_subscription(&self) {
        match self.node.get().and_then(Weak::upgrade) {
            Some(node) => Subscription::from_node(node).dispose(),
            None => {
                self.begin_dispose();
            }
        }
    }

    /// Gate for incoming notifications.
    ///
    /// Deliveries after termination are dropped; deliveries before
    /// initialization are a protocol violation.
    pub fn accepts(&self, operator: &'static str) -> bool {
        match self.lifecycle() {
            Lifecycle::Initialized => true,
            Lifecycle::Created => {
                debug_assert!(false, "`{}` received a notification before initialization", operator);
                tracing::warn!(operator, "notification delivered to uninitialized operator");
                false
            }
            Lifecycle::Disposed => {
                tracing::trace!(operator, "dropped notification after termination");
                false
            }
        }
    }

    pub(crate) fn bind(&self, node: Weak<Node>) {
        let bound = self.node.set(node).is_ok();
        debug_assert!(bound, "operator wrapped by more than one subscription");
    }
}

impl Default for OperatorCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperatorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorCore")
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::VirtualTimeScheduler;

    fn context() -> OperatorContext {
        OperatorContext::new(
            Arc::new(VirtualTimeScheduler::new(0)),
            Arc::new(Settings::new()),
        )
    }

    #[test]
    fn test_lifecycle_transitions() {
        let core = OperatorCore::new();
        assert_eq!(core.lifecycle(), Lifecycle::Created);
        assert!(core.context().is_none());

        core.set_context(context().with_instance_id("q1"));
        assert!(core.is_running());
        assert_eq!(core.context().and_then(|c| c.instance_id()), Some("q1"));
        assert!(core.accepts("test"));

        assert!(core.begin_dispose());
        assert!(!core.begin_dispose());
        assert!(core.is_disposed());
        assert!(!core.accepts("test"));
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_context_assigned_twice_panics() {
        let core = OperatorCore::new();
        core.set_context(context());
        core.set_context(context());
    }

    #[test]
    fn test_unbound_dispose_falls_back() {
        let core = OperatorCore::new();
        core.dispose_subscription();
        assert!(core.is_disposed());
    }
}
