//! Operator runtime contract.
//!
//! [`Subscribable::subscribe`] builds one [`Operator`] and one
//! [`Subscription`] per stage, producing a tree whose root is the outermost
//! stage. A [`SubscriptionVisitor`] then initializes, checkpoints or disposes
//! the whole tree in a fixed order.

mod node;
mod observer;
mod operator;
mod visitor;

pub use node::Subscription;
pub use observer::{Downstream, Observer, Subscribable};
pub use operator::{Operator, OperatorContext, OperatorCore};
pub use visitor::SubscriptionVisitor;
