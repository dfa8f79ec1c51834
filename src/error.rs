//! Error types for the reactive runtime.

use crate::types::Version;
use thiserror::Error;

/// Errors returned synchronously through `Result`.
///
/// These cover composition-time validation, settings, the state codec,
/// checkpoint envelopes, the host and scheduler misuse. Errors produced while
/// a sequence runs are [`SequenceError`]s delivered through `on_error`.
#[derive(Debug, Error)]
pub enum RxError {
    #[error("Invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("Invalid setting `{key}`: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Unexpected end of state: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },

    #[error("Invalid state format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Topology mismatch: checkpoint holds {found} operator blocks, subscription has {expected}")]
    TopologyMismatch { expected: usize, found: usize },

    #[error("Operator mismatch at position {position}: expected `{expected}`, checkpoint has `{found}`")]
    OperatorMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    #[error("Incompatible state version for `{operator}`: checkpoint is {found}, operator is {supported}")]
    IncompatibleVersion {
        operator: String,
        found: Version,
        supported: Version,
    },

    #[error("Operator `{operator}` left {remaining} unread bytes in its state block")]
    TrailingState { operator: String, remaining: usize },

    #[error("Subscription already exists: {0}")]
    SubscriptionExists(String),

    #[error("Subscription not found: {0}")]
    SubscriptionNotFound(String),

    #[error("Recovery failed for {failed:?} ({restored} restored from checkpoints)")]
    RecoveryFailed { restored: usize, failed: Vec<String> },

    #[error("Scheduler is already running")]
    SchedulerRunning,

    #[error("Scheduler has been shut down")]
    SchedulerShutdown,

    #[error("Failed to spawn scheduler thread: {0}")]
    SchedulerSpawn(#[source] std::io::Error),
}

impl RxError {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        RxError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

/// Errors delivered through `on_error`, terminating a sequence.
///
/// User-supplied functions report failure by returning one of these; the
/// operator forwards it downstream at the tick it was produced.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SequenceError {
    #[error("Sequence contains no elements")]
    EmptySequence,

    #[error("Resource limit exceeded: `{setting}` allows at most {limit}")]
    ResourceExhausted { setting: String, limit: usize },

    #[error("Arithmetic operation resulted in an overflow")]
    Overflow,

    #[error("{0}")]
    User(String),
}

impl SequenceError {
    /// Failure raised by a user-supplied function.
    pub fn user(message: impl Into<String>) -> Self {
        SequenceError::User(message.into())
    }

    pub(crate) fn exhausted(setting: &str, limit: usize) -> Self {
        SequenceError::ResourceExhausted {
            setting: setting.to_string(),
            limit,
        }
    }
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RxError>;

/// Result type for user-supplied functions.
pub type SequenceResult<T> = std::result::Result<T, SequenceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_spawn_failure_keeps_io_source() {
        let err = RxError::SchedulerSpawn(std::io::Error::new(
            std::io::ErrorKind::WouldBlock,
            "no threads left",
        ));
        assert_eq!(
            err.to_string(),
            "Failed to spawn scheduler thread: no threads left"
        );
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "no threads left");
    }

    #[test]
    fn test_recovery_failure_names_instances() {
        let err = RxError::RecoveryFailed {
            restored: 1,
            failed: vec!["a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Recovery failed for [\"a\"] (1 restored from checkpoints)"
        );
    }
}
