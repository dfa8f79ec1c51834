//! Subscription tree nodes.

use super::Operator;
use crate::types::Lifecycle;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub(crate) struct Node {
    operator: Arc<dyn Operator>,
    children: Vec<Subscription>,
    disposed: AtomicBool,
}

/// Disposable handle to a live operator and the upstream subscriptions it
/// owns.
///
/// Parents own their children. An operator only holds a weak reference back
/// to its own node, used to dispose itself after forwarding a terminal.
#[derive(Clone)]
pub struct Subscription {
    node: Arc<Node>,
}

impl Subscription {
    /// Wrap `operator`, taking ownership of its upstream `children`.
    pub fn new(operator: Arc<dyn Operator>, children: Vec<Subscription>) -> Self {
        let node = Arc::new(Node {
            operator,
            children,
            disposed: AtomicBool::new(false),
        });
        node.operator.core().bind(Arc::downgrade(&node));
        Self { node }
    }

    pub(crate) fn from_node(node: Arc<Node>) -> Self {
        Self { node }
    }

    pub fn operator(&self) -> &Arc<dyn Operator> {
        &self.node.operator
    }

    /// Upstream subscriptions, in the order the operator subscribed to them.
    pub fn children(&self) -> &[Subscription] {
        &self.node.children
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.node.operator.core().lifecycle()
    }

    pub fn is_disposed(&self) -> bool {
        self.node.disposed.load(Ordering::SeqCst)
    }

    /// Dispose children first, then this operator. Idempotent.
    pub fn dispose(&self) {
        if self.node.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for child in &self.node.children {
            child.dispose();
        }
        let operator = &self.node.operator;
        if operator.core().begin_dispose() {
            tracing::trace!(operator = operator.name(), "disposed operator");
            operator.on_dispose();
        }
    }

    /// Identity of the underlying node.
    pub(crate) fn key(&self) -> usize {
        Arc::as_ptr(&self.node) as *const () as usize
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("operator", &self.node.operator.name())
            .field("lifecycle", &self.lifecycle())
            .field("children", &self.node.children)
            .finish()
    }
}
