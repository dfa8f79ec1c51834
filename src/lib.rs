//! # Resumable Rx
//!
//! Push-based reactive operators whose running state can be checkpointed and
//! restored.
//!
//! ## Core Concepts
//!
//! - **Operators**: State machines (`Created -> Initialized -> Disposed`) that
//!   consume notifications from upstream and push results downstream
//! - **Subscriptions**: A tree of disposable handles mirroring the pipeline
//! - **Visitor**: Initializes, checkpoints and disposes a tree in one fixed
//!   order
//! - **Schedulers**: Virtual time for deterministic tests, real time for
//!   production
//! - **Checkpoints**: Per-operator state blocks in a checksummed envelope
//!
//! ## Example
//!
//! ```ignore
//! use resumable_rx::operators::SubscribableExt;
//! use resumable_rx::testing::{on_completed, on_next, TestRun, TestScheduler};
//!
//! let scheduler = TestScheduler::new();
//! let xs = scheduler.create_hot_observable(vec![
//!     on_next(210, 2),
//!     on_next(230, 3),
//!     on_completed(400),
//! ]);
//!
//! // Save at 290, then rebuild the pipeline from the checkpoint at 305.
//! let results = scheduler.run(
//!     TestRun::new(move || xs.clone().aggregate(|acc, x| Ok(acc + x)))
//!         .save_at(290)
//!         .load_at(305),
//! )?;
//! assert_eq!(results.messages(), vec![on_next(400, 5), on_completed(400)]);
//! ```

pub mod checkpoint;
pub mod codec;
pub mod error;
pub mod host;
pub mod operators;
pub mod scheduler;
pub mod settings;
pub mod subscription;
pub mod testing;
pub mod types;

// Re-exports
pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use codec::{Persist, StateReader, StateWriter};
pub use error::{Result, RxError, SequenceError, SequenceResult};
pub use host::{QueryHost, SubscriptionFactory};
pub use operators::SubscribableExt;
pub use scheduler::{RealTimeScheduler, ScheduledTask, Scheduler, VirtualTimeScheduler};
pub use settings::Settings;
pub use subscription::{
    Downstream, Observer, Operator, OperatorContext, OperatorCore, Subscribable, Subscription,
    SubscriptionVisitor,
};
pub use types::{Lifecycle, Notification, Tick, Value, Version};
