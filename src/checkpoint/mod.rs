//! Checkpointing of whole subscription trees.
//!
//! # Envelope
//!
//! ```text
//! magic        4 bytes  "RXC\0"
//! format       u8       1
//! block_count  u32
//! block*       u32 length, u8 flags, header, operator fields
//! crc32        u32      over every byte between magic and crc
//! ```
//!
//! The header is the operator name (length-prefixed string) followed by its
//! version as four `i32`. Every node writes one block, in
//! [`SubscriptionVisitor`] order. Flag bit 0 marks an operator that was
//! disposed at save time; its block carries no fields. Stateless operators
//! write the header only, so their lifecycle survives a restore.

mod envelope;
mod store;

pub use envelope::{CheckpointBlock, CheckpointReader, CheckpointWriter, OperatorHeader};
pub use store::{CheckpointStore, MemoryCheckpointStore};

use crate::error::{Result, RxError};
use crate::subscription::{Subscription, SubscriptionVisitor};
use crate::types::Lifecycle;

/// Serialize the lifecycle of every operator in the tree, and the state of
/// every stateful one.
pub fn save(root: &Subscription) -> Vec<u8> {
    let visitor = SubscriptionVisitor::new(root);
    let mut writer = CheckpointWriter::new();

    for operator in visitor.operators() {
        let header = OperatorHeader::new(operator.name(), operator.version());
        let disposed = operator.core().lifecycle() == Lifecycle::Disposed;
        writer.write_block(&header, disposed, |fields| {
            if operator.is_stateful() {
                operator.save_state(fields);
            }
        });
    }

    let blocks = writer.block_count();
    let bytes = writer.finish();
    tracing::debug!(blocks, bytes = bytes.len(), "saved checkpoint");
    bytes
}

/// Restore a checkpoint into a freshly subscribed, uninitialized tree.
///
/// The tree must have the same operators, in the same order, as the one that
/// was saved. Operators that were disposed at save time are disposed again
/// once every block has been read, so a terminated pipeline stays terminated.
///
/// # Errors
///
/// A mismatch in topology, operator names or leftover bytes means the
/// checkpoint does not belong to this tree. [`RxError::IncompatibleVersion`]
/// means the deployed operator code is older than the code that wrote the
/// checkpoint, or of a different major version. That is a deployment
/// configuration error: retrying the same load will fail the same way.
///
/// # Panics
///
/// If an operator in the tree was already initialized or disposed.
pub fn load(root: &Subscription, bytes: &[u8]) -> Result<()> {
    let visitor = SubscriptionVisitor::new(root);
    let targets = visitor.subscriptions();
    let mut reader = CheckpointReader::open(bytes)?;

    if reader.block_count() != targets.len() {
        return Err(RxError::TopologyMismatch {
            expected: targets.len(),
            found: reader.block_count(),
        });
    }

    let mut disposed = Vec::new();
    for (position, subscription) in targets.iter().enumerate() {
        let operator = subscription.operator();
        assert!(
            operator.core().lifecycle() == Lifecycle::Created,
            "state loaded into operator `{}` after initialization",
            operator.name()
        );

        let block = reader.next_block()?.ok_or_else(|| {
            RxError::InvalidFormat(format!("checkpoint ended before block {}", position))
        })?;

        if block.header.name != operator.name() {
            return Err(RxError::OperatorMismatch {
                position,
                expected: operator.name().to_string(),
                found: block.header.name,
            });
        }

        let supported = operator.version();
        if !supported.can_read(block.header.version) {
            tracing::error!(
                operator = %block.header.name,
                found = %block.header.version,
                supported = %supported,
                "incompatible checkpoint version"
            );
            return Err(RxError::IncompatibleVersion {
                operator: block.header.name,
                found: block.header.version,
                supported,
            });
        }

        if block.disposed {
            disposed.push(subscription);
            continue;
        }

        let mut fields = block.fields();
        operator.load_state(&mut fields, block.header.version)?;
        if !fields.is_exhausted() {
            return Err(RxError::TrailingState {
                operator: block.header.name,
                remaining: fields.remaining(),
            });
        }
    }

    // Catches trailing bytes after the last block.
    reader.next_block()?;

    for subscription in &disposed {
        subscription.dispose();
    }

    tracing::debug!(
        blocks = targets.len(),
        disposed = disposed.len(),
        "loaded checkpoint"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{StateReader, StateWriter};
    use crate::subscription::{Operator, OperatorCore};
    use crate::types::Version;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Counter {
        core: OperatorCore,
        name: &'static str,
        version: Version,
        value: Mutex<i64>,
    }

    impl Operator for Counter {
        fn core(&self) -> &OperatorCore {
            &self.core
        }

        fn name(&self) -> &'static str {
            self.name
        }

        fn version(&self) -> Version {
            self.version
        }

        fn save_state(&self, writer: &mut StateWriter) {
            writer.write(&*self.value.lock());
        }

        fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
            *self.value.lock() = reader.read()?;
            Ok(())
        }
    }

    struct Stateless {
        core: OperatorCore,
    }

    impl Operator for Stateless {
        fn core(&self) -> &OperatorCore {
            &self.core
        }

        fn name(&self) -> &'static str {
            "test:stateless"
        }

        fn is_stateful(&self) -> bool {
            false
        }
    }

    fn counter(name: &'static str, version: Version, value: i64) -> Arc<Counter> {
        Arc::new(Counter {
            core: OperatorCore::new(),
            name,
            version,
            value: Mutex::new(value),
        })
    }

    fn pipeline(outer: Arc<Counter>, inner: Arc<Counter>) -> Subscription {
        let source = Subscription::new(Arc::new(Stateless { core: OperatorCore::new() }), vec![]);
        let inner = Subscription::new(inner, vec![source]);
        Subscription::new(outer, vec![inner])
    }

    #[test]
    fn test_round_trip_writes_every_node() {
        let saved = pipeline(counter("a", Version::V1, 3), counter("b", Version::V1, 4));
        let bytes = save(&saved);
        let mut reader = CheckpointReader::open(&bytes).unwrap();
        assert_eq!(reader.block_count(), 3);
        reader.next_block().unwrap();
        reader.next_block().unwrap();
        let source = reader.next_block().unwrap().unwrap();
        assert_eq!(source.header.name, "test:stateless");
        assert!(source.fields().is_exhausted());

        let outer = counter("a", Version::V1, 0);
        let inner = counter("b", Version::V1, 0);
        let restored = pipeline(outer.clone(), inner.clone());
        load(&restored, &bytes).unwrap();
        assert_eq!(*outer.value.lock(), 3);
        assert_eq!(*inner.value.lock(), 4);
    }

    #[test]
    fn test_operator_mismatch() {
        let bytes = save(&pipeline(counter("a", Version::V1, 1), counter("b", Version::V1, 2)));
        let swapped = pipeline(counter("b", Version::V1, 0), counter("a", Version::V1, 0));
        assert!(matches!(
            load(&swapped, &bytes),
            Err(RxError::OperatorMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn test_topology_mismatch() {
        let bytes = save(&pipeline(counter("a", Version::V1, 1), counter("b", Version::V1, 2)));
        let single = Subscription::new(counter("a", Version::V1, 0), vec![]);
        assert!(matches!(
            load(&single, &bytes),
            Err(RxError::TopologyMismatch {
                expected: 1,
                found: 3
            })
        ));
    }

    #[test]
    fn test_version_rules() {
        let newer = Version::new(1, 1, 0, 0);
        let bytes_v1 = save(&Subscription::new(counter("a", Version::V1, 5), vec![]));
        let bytes_newer = save(&Subscription::new(counter("a", newer, 5), vec![]));

        // Older state is readable by a newer minor version.
        let reader = counter("a", newer, 0);
        load(&Subscription::new(reader.clone(), vec![]), &bytes_v1).unwrap();
        assert_eq!(*reader.value.lock(), 5);

        // Newer state is not readable by an older operator.
        assert!(matches!(
            load(&Subscription::new(counter("a", Version::V1, 0), vec![]), &bytes_newer),
            Err(RxError::IncompatibleVersion { .. })
        ));

        // Major versions never mix.
        assert!(matches!(
            load(&Subscription::new(counter("a", Version::new(2, 0, 0, 0), 0), vec![]), &bytes_v1),
            Err(RxError::IncompatibleVersion { .. })
        ));
    }

    #[test]
    fn test_trailing_state_rejected() {
        let mut writer = CheckpointWriter::new();
        writer.write_block(&OperatorHeader::new("a", Version::V1), false, |w| {
            w.write(&1i64);
            w.write(&2i64);
        });
        let bytes = writer.finish();
        assert!(matches!(
            load(&Subscription::new(counter("a", Version::V1, 0), vec![]), &bytes),
            Err(RxError::TrailingState { remaining: 8, .. })
        ));
    }

    #[test]
    fn test_disposed_block_disposes_operator() {
        let saved_inner = counter("b", Version::V1, 2);
        let saved = pipeline(counter("a", Version::V1, 1), saved_inner.clone());
        saved.children()[0].dispose();
        let bytes = save(&saved);

        let inner = counter("b", Version::V1, 0);
        let restored = pipeline(counter("a", Version::V1, 0), inner.clone());
        load(&restored, &bytes).unwrap();
        assert!(inner.core.is_disposed());
        assert_eq!(*inner.value.lock(), 0);
        assert_eq!(restored.lifecycle(), Lifecycle::Created);
    }

    #[test]
    fn test_disposed_stateless_node_is_disposed_again() {
        let saved = pipeline(counter("a", Version::V1, 1), counter("b", Version::V1, 2));
        saved.children()[0].children()[0].dispose();
        let bytes = save(&saved);

        let restored = pipeline(counter("a", Version::V1, 0), counter("b", Version::V1, 0));
        load(&restored, &bytes).unwrap();
        let source = &restored.children()[0].children()[0];
        assert!(source.is_disposed());
        assert!(!restored.children()[0].is_disposed());
    }

    #[test]
    #[should_panic(expected = "after initialization")]
    fn test_load_after_initialize_panics() {
        use crate::scheduler::VirtualTimeScheduler;
        use crate::settings::Settings;
        use crate::subscription::OperatorContext;

        let op = counter("a", Version::V1, 1);
        let sub = Subscription::new(op, vec![]);
        let bytes = save(&sub);
        SubscriptionVisitor::new(&sub)
            .initialize(&OperatorContext::new(
                Arc::new(VirtualTimeScheduler::new(0)),
                Arc::new(Settings::new()),
            ))
            .unwrap();
        let _ = load(&sub, &bytes);
    }
}
