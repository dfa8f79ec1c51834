//! Deterministic traversal of a subscription tree.

use super::{Operator, OperatorContext, Subscription};
use crate::error::Result;
use crate::types::Lifecycle;
use std::collections::HashSet;
use std::sync::Arc;

/// Flattened view of a subscription tree.
///
/// Nodes are listed pre-order: a parent, then its children left to right.
/// A node reachable through more than one handle is listed once. Every
/// traversal (initialize, save, load, dispose) uses this order.
pub struct SubscriptionVisitor {
    nodes: Vec<Subscription>,
}

impl SubscriptionVisitor {
    pub fn new(root: &Subscription) -> Self {
        let mut nodes = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root.clone()];

        while let Some(node) = stack.pop() {
            if !seen.insert(node.key()) {
                continue;
            }
            for child in node.children().iter().rev() {
                stack.push(child.clone());
            }
            nodes.push(node);
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in traversal order.
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.nodes
    }

    pub fn operators(&self) -> impl Iterator<Item = &Arc<dyn Operator>> + '_ {
        self.nodes.iter().map(Subscription::operator)
    }

    /// Give every live operator its context, then start them.
    ///
    /// Fails on the first operator that rejects the context (typically an
    /// invalid setting); the caller should dispose the tree.
    ///
    /// # Panics
    ///
    /// If an operator in the tree was already initialized.
    pub fn initialize(&self, context: &OperatorContext) -> Result<()> {
        let mut started = 0usize;
        for operator in self.operators() {
            if operator.core().lifecycle() == Lifecycle::Disposed {
                continue;
            }
            operator.core().set_context(context.clone());
            operator.on_context(context)?;
            started += 1;
        }

        for operator in self.operators() {
            if operator.core().is_running() {
                operator.on_start();
            }
        }

        tracing::debug!(
            operators = self.nodes.len(),
            started,
            instance = context.instance_id().unwrap_or(""),
            "initialized subscription"
        );
        Ok(())
    }

    /// Dispose every node, children before parents.
    pub fn dispose(&self) {
        for node in self.nodes.iter().rev() {
            node.dispose();
        }
        tracing::debug!(operators = self.nodes.len(), "disposed subscription");
    }
}
