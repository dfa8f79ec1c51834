//! Checkpoint storage.

use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keyed storage for sealed checkpoints.
///
/// Durable media live outside this crate; hosts plug them in here.
pub trait CheckpointStore: Send + Sync {
    fn put(&self, id: &str, checkpoint: Vec<u8>) -> Result<()>;

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Returns whether a checkpoint was removed.
    fn remove(&self, id: &str) -> Result<bool>;

    /// Stored ids, sorted.
    fn ids(&self) -> Result<Vec<String>>;
}

/// In-memory checkpoint store.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.read().is_empty()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn put(&self, id: &str, checkpoint: Vec<u8>) -> Result<()> {
        self.checkpoints.write().insert(id.to_string(), checkpoint);
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.checkpoints.read().get(id).cloned())
    }

    fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.checkpoints.write().remove(id).is_some())
    }

    fn ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.checkpoints.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryCheckpointStore::new();
        assert!(store.is_empty());

        store.put("b", vec![2]).unwrap();
        store.put("a", vec![1]).unwrap();
        store.put("a", vec![1, 1]).unwrap();

        assert_eq!(store.get("a").unwrap(), Some(vec![1, 1]));
        assert_eq!(store.ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.get("a").unwrap(), None);
        assert_eq!(store.len(), 1);
    }
}
