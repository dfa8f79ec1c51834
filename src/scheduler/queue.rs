//! Priority queue of scheduled actions.

use super::{Action, ScheduledTask};
use crate::types::Tick;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One queued action.
pub struct ScheduledEntry {
    due: Tick,
    sequence: u64,
    cancelled: Arc<AtomicBool>,
    action: Action,
}

impl ScheduledEntry {
    /// Build an entry and the handle that cancels it.
    pub fn new(due: Tick, sequence: u64, action: Action) -> (Self, ScheduledTask) {
        let task = ScheduledTask::new(due, sequence);
        let entry = Self {
            due,
            sequence,
            cancelled: task.flag(),
            action,
        };
        (entry, task)
    }

    pub fn due(&self) -> Tick {
        self.due
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Invoke the action unless it was cancelled. Returns whether it ran.
    pub fn run(self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        (self.action)();
        true
    }
}

impl fmt::Debug for ScheduledEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEntry")
            .field("due", &self.due)
            .field("sequence", &self.sequence)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.sequence == other.sequence
    }
}

impl Eq for ScheduledEntry {}

impl Ord for ScheduledEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Min-heap: earliest due first, then lowest sequence.
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Actions ordered by `(due, sequence)`.
#[derive(Debug, Default)]
pub struct ActionQueue {
    heap: BinaryHeap<ScheduledEntry>,
    next_sequence: u64,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an action, assigning the next sequence number.
    pub fn push(&mut self, due: Tick, action: Action) -> ScheduledTask {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let (entry, task) = ScheduledEntry::new(due, sequence, action);
        self.heap.push(entry);
        task
    }

    /// Queue an entry whose sequence number was assigned elsewhere.
    pub fn insert(&mut self, entry: ScheduledEntry) {
        self.heap.push(entry);
    }

    /// Due time of the earliest live action.
    pub fn peek_due(&mut self) -> Option<Tick> {
        self.discard_cancelled();
        self.heap.peek().map(|e| e.due)
    }

    /// Remove the earliest live action if it is due at or before `horizon`
    /// (or unconditionally when `horizon` is `None`).
    pub fn pop_due(&mut self, horizon: Option<Tick>) -> Option<ScheduledEntry> {
        self.discard_cancelled();
        match (self.heap.peek(), horizon) {
            (Some(entry), Some(limit)) if entry.due > limit => None,
            (Some(_), _) => self.heap.pop(),
            (None, _) => None,
        }
    }

    /// Number of queued actions, cancelled ones included until discarded.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }

    fn discard_cancelled(&mut self) {
        while self.heap.peek().map_or(false, |e| e.is_cancelled()) {
            self.heap.pop();
        }
    }
}
