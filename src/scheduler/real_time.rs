//! Wall-clock scheduler backed by a dispatcher thread.

use super::{Action, ActionQueue, ScheduledEntry, ScheduledTask, Scheduler};
use crate::error::{Result, RxError};
use crate::types::Tick;
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Real-time ticks are microseconds.
pub const TICKS_PER_SECOND: Tick = 1_000_000;

pub const TICKS_PER_MILLISECOND: Tick = 1_000;

enum Command {
    Schedule(ScheduledEntry),
    Shutdown,
}

/// Scheduler that dispatches actions against the wall clock.
///
/// All actions run on one dispatcher thread, one at a time, in
/// `(due, sequence)` order. `now()` is the number of microseconds since the
/// scheduler was created.
pub struct RealTimeScheduler {
    epoch: Instant,
    sender: Sender<Command>,
    next_sequence: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RealTimeScheduler {
    /// Spawn the dispatcher thread.
    pub fn new() -> Result<Self> {
        let epoch = Instant::now();
        let (sender, receiver) = unbounded::<Command>();

        let worker = std::thread::Builder::new()
            .name("rx-scheduler".to_string())
            .spawn(move || {
                let mut queue = ActionQueue::new();
                loop {
                    let now = ticks_since(epoch);
                    while let Some(entry) = queue.pop_due(Some(now)) {
                        tracing::trace!(due = entry.due(), sequence = entry.sequence(), "run real-time action");
                        entry.run();
                    }

                    let command = match queue.peek_due() {
                        Some(due) => receiver.recv_deadline(epoch + ticks_to_duration(due)),
                        None => receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };

                    match command {
                        Ok(Command::Schedule(entry)) => queue.insert(entry),
                        Ok(Command::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                        Err(RecvTimeoutError::Timeout) => {}
                    }
                }
                queue.clear();
            })
            .map_err(RxError::SchedulerSpawn)?;

        Ok(Self {
            epoch,
            sender,
            next_sequence: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop the dispatcher thread; queued actions are dropped. Idempotent.
    pub fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = self.sender.send(Command::Shutdown);
            if worker.thread().id() != std::thread::current().id() {
                let _ = worker.join();
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.worker.lock().is_none()
    }
}

impl Scheduler for RealTimeScheduler {
    fn now(&self) -> Tick {
        ticks_since(self.epoch)
    }

    fn schedule_absolute(&self, due: Tick, action: Action) -> ScheduledTask {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let (entry, task) = ScheduledEntry::new(due, sequence, action);
        if self.sender.send(Command::Schedule(entry)).is_err() {
            tracing::warn!(due, sequence, "action scheduled after real-time scheduler shut down");
            task.cancel();
        }
        task
    }
}

impl Drop for RealTimeScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn ticks_since(epoch: Instant) -> Tick {
    Tick::try_from(epoch.elapsed().as_micros()).unwrap_or(Tick::MAX)
}

fn ticks_to_duration(ticks: Tick) -> Duration {
    Duration::from_micros(ticks.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_runs_relative_action_after_delay() {
        let scheduler = RealTimeScheduler::new().unwrap();
        let (tx, rx) = bounded(1);
        let scheduled_at = scheduler.now();
        scheduler.schedule_relative(
            20 * TICKS_PER_MILLISECOND,
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(scheduler.now() - scheduled_at >= 20 * TICKS_PER_MILLISECOND);
    }

    #[test]
    fn test_equal_due_times_keep_insertion_order() {
        let scheduler = RealTimeScheduler::new().unwrap();
        let (tx, rx) = unbounded();
        let due = scheduler.now() + 10 * TICKS_PER_MILLISECOND;
        for i in 0..5 {
            let tx = tx.clone();
            scheduler.schedule_absolute(
                due,
                Box::new(move || {
                    let _ = tx.send(i);
                }),
            );
        }

        let order: Vec<i32> = (0..5)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_earlier_due_runs_first() {
        let scheduler = RealTimeScheduler::new().unwrap();
        let (tx, rx) = unbounded();
        let now = scheduler.now();
        for (label, offset) in [("late", 30), ("early", 5)] {
            let tx = tx.clone();
            scheduler.schedule_absolute(
                now + offset * TICKS_PER_MILLISECOND,
                Box::new(move || {
                    let _ = tx.send(label);
                }),
            );
        }

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "early");
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "late");
    }

    #[test]
    fn test_cancel_and_shutdown() {
        let scheduler = RealTimeScheduler::new().unwrap();
        let (tx, rx) = unbounded();
        let task = {
            let tx = tx.clone();
            scheduler.schedule_relative(
                10 * TICKS_PER_MILLISECOND,
                Box::new(move || {
                    let _ = tx.send("cancelled");
                }),
            )
        };
        task.cancel();
        scheduler.schedule_relative(
            20 * TICKS_PER_MILLISECOND,
            Box::new(move || {
                let _ = tx.send("kept");
            }),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), "kept");

        scheduler.shutdown();
        assert!(scheduler.is_shut_down());
        let late = scheduler.schedule_relative(0, Box::new(|| {}));
        assert!(late.is_cancelled());
    }
}
