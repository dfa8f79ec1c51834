//! Per-subscription settings bag.
//!
//! Operators consult the bag once, when they receive their context. Keys are
//! plain strings; values are JSON so a host can load them from a config file.
//!
//! ```ignore
//! let settings = Settings::from_json(r#"{
//!     "operators/buffer/settings/maxBufferCount": 5
//! }"#)?;
//! assert_eq!(settings.limit(keys::MAX_BUFFER_COUNT)?, 5);
//! ```

use crate::error::{Result, RxError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Well-known setting keys.
pub mod keys {
    /// Maximum number of concurrently open buffers in `Buffer`.
    pub const MAX_BUFFER_COUNT: &str = "operators/buffer/settings/maxBufferCount";

    /// Maximum number of elements in a single `Buffer` buffer.
    pub const MAX_BUFFER_SIZE: &str = "operators/buffer/settings/maxBufferSize";

    /// Maximum number of elements collected by `ToList`.
    pub const MAX_LIST_SIZE: &str = "operators/toList/settings/maxListSize";

    /// Maximum number of elements queued on either side of `SequenceEqual`.
    pub const MAX_QUEUE_SIZE: &str = "operators/sequenceEqual/settings/maxQueueSize";
}

/// Read-only string-keyed settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
    values: HashMap<String, JsonValue>,
}

impl Settings {
    /// An empty bag; every lookup falls back to its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON object of `key -> value` pairs.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RxError::InvalidSetting {
            key: "<document>".to_string(),
            reason: e.to_string(),
        })
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resource bound for `key`; unset keys are unbounded (`usize::MAX`).
    pub fn limit(&self, key: &str) -> Result<usize> {
        match self.values.get(key) {
            None => Ok(usize::MAX),
            Some(value) => value
                .as_u64()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| RxError::InvalidSetting {
                    key: key.to_string(),
                    reason: format!("expected a non-negative integer, got {}", value),
                }),
        }
    }
}
