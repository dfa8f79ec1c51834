//! Deterministic virtual-time scheduler.

use super::{Action, ActionQueue, ScheduledTask, Scheduler};
use crate::error::{Result, RxError};
use crate::types::Tick;
use parking_lot::Mutex;

struct VirtualState {
    clock: Tick,
    queue: ActionQueue,
    running: bool,
    stop_requested: bool,
}

/// Clears the running flag when a run loop exits, including by panic.
struct RunGuard<'a> {
    state: &'a Mutex<VirtualState>,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.running = false;
        state.stop_requested = false;
    }
}

/// Scheduler whose clock only moves when queued actions run.
///
/// Running pops the earliest action, advances the clock to its due time and
/// invokes it; actions may schedule further actions. The state lock is never
/// held while an action runs.
pub struct VirtualTimeScheduler {
    state: Mutex<VirtualState>,
}

impl VirtualTimeScheduler {
    /// A scheduler whose clock starts at `initial`.
    pub fn new(initial: Tick) -> Self {
        Self {
            state: Mutex::new(VirtualState {
                clock: initial,
                queue: ActionQueue::new(),
                running: false,
                stop_requested: false,
            }),
        }
    }

    /// Run until the queue is empty or [`stop`](Self::stop) is called.
    pub fn start(&self) -> Result<()> {
        self.run(None)
    }

    /// Run every action due at or before `time`, then set the clock to `time`.
    pub fn advance_to(&self, time: Tick) -> Result<()> {
        let now = self.now();
        if time < now {
            return Err(RxError::invalid_argument(
                "time",
                format!("cannot move virtual time backwards from {} to {}", now, time),
            ));
        }
        self.run(Some(time))
    }

    /// Run every action due within `delta` ticks from now.
    pub fn advance_by(&self, delta: Tick) -> Result<()> {
        if delta < 0 {
            return Err(RxError::invalid_argument("delta", "must not be negative"));
        }
        let target = self.now().saturating_add(delta);
        self.advance_to(target)
    }

    /// Move the clock forward without running anything.
    pub fn sleep(&self, delta: Tick) -> Result<()> {
        if delta < 0 {
            return Err(RxError::invalid_argument("delta", "must not be negative"));
        }
        let mut state = self.state.lock();
        state.clock = state.clock.saturating_add(delta);
        Ok(())
    }

    /// Ask a running loop to return after the current action.
    pub fn stop(&self) {
        self.state.lock().stop_requested = true;
    }

    /// Number of queued actions (cancelled ones may still be counted).
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    fn run(&self, horizon: Option<Tick>) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.running {
                return Err(RxError::SchedulerRunning);
            }
            state.running = true;
            state.stop_requested = false;
        }
        let _guard = RunGuard { state: &self.state };

        loop {
            let entry = {
                let mut state = self.state.lock();
                if state.stop_requested {
                    break;
                }
                match state.queue.pop_due(horizon) {
                    Some(entry) => {
                        if entry.due() > state.clock {
                            state.clock = entry.due();
                        }
                        entry
                    }
                    None => break,
                }
            };

            tracing::trace!(due = entry.due(), sequence = entry.sequence(), "run virtual action");
            entry.run();
        }

        if let Some(limit) = horizon {
            let mut state = self.state.lock();
            if !state.stop_requested && state.clock < limit {
                state.clock = limit;
            }
        }
        Ok(())
    }
}

impl Default for VirtualTimeScheduler {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Scheduler for VirtualTimeScheduler {
    fn now(&self) -> Tick {
        self.state.lock().clock
    }

    fn schedule_absolute(&self, due: Tick, action: Action) -> ScheduledTask {
        self.state.lock().queue.push(due, action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn log_at(scheduler: &Arc<VirtualTimeScheduler>, log: &Arc<Mutex<Vec<(Tick, &'static str)>>>, due: Tick, tag: &'static str) {
        let log = Arc::clone(log);
        let clock = Arc::clone(scheduler);
        scheduler.schedule_absolute(due, Box::new(move || log.lock().push((clock.now(), tag))));
    }

    #[test]
    fn test_runs_in_time_order() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        log_at(&scheduler, &log, 30, "c");
        log_at(&scheduler, &log, 10, "a");
        log_at(&scheduler, &log, 20, "b");

        scheduler.start().unwrap();
        assert_eq!(*log.lock(), vec![(10, "a"), (20, "b"), (30, "c")]);
        assert_eq!(scheduler.now(), 30);
    }

    #[test]
    fn test_equal_due_times_run_in_insertion_order() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        log_at(&scheduler, &log, 10, "first");
        log_at(&scheduler, &log, 10, "second");
        log_at(&scheduler, &log, 10, "third");

        scheduler.start().unwrap();
        let tags: Vec<_> = log.lock().iter().map(|(_, t)| *t).collect();
        assert_eq!(tags, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_nested_scheduling() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let inner = Arc::clone(&scheduler);
            let log = Arc::clone(&log);
            scheduler.schedule_absolute(
                10,
                Box::new(move || {
                    let log2 = Arc::clone(&log);
                    let clock = Arc::clone(&inner);
                    inner.schedule_relative(5, Box::new(move || log2.lock().push((clock.now(), "inner"))));
                    log.lock().push((inner.now(), "outer"));
                }),
            );
        }

        scheduler.start().unwrap();
        assert_eq!(*log.lock(), vec![(10, "outer"), (15, "inner")]);
    }

    #[test]
    fn test_past_due_runs_at_current_clock() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(100));
        let log = Arc::new(Mutex::new(Vec::new()));
        log_at(&scheduler, &log, 50, "late");

        scheduler.start().unwrap();
        assert_eq!(*log.lock(), vec![(100, "late")]);
    }

    #[test]
    fn test_advance_to_horizon() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        log_at(&scheduler, &log, 10, "a");
        log_at(&scheduler, &log, 50, "b");

        scheduler.advance_to(20).unwrap();
        assert_eq!(*log.lock(), vec![(10, "a")]);
        assert_eq!(scheduler.now(), 20);

        scheduler.advance_by(30).unwrap();
        assert_eq!(log.lock().len(), 2);
        assert_eq!(scheduler.now(), 50);

        assert!(scheduler.advance_to(10).is_err());
    }

    #[test]
    fn test_sleep_moves_clock_only() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        log_at(&scheduler, &log, 5, "a");

        scheduler.sleep(10).unwrap();
        assert_eq!(scheduler.now(), 10);
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn test_cancelled_action_does_not_run() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        let task = {
            let log = Arc::clone(&log);
            scheduler.schedule_absolute(10, Box::new(move || log.lock().push((10, "x"))))
        };
        task.cancel();
        task.cancel();

        scheduler.start().unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_stop() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let inner = Arc::clone(&scheduler);
            scheduler.schedule_absolute(10, Box::new(move || inner.stop()));
        }
        log_at(&scheduler, &log, 20, "after");

        scheduler.start().unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(scheduler.now(), 10);

        scheduler.start().unwrap();
        assert_eq!(*log.lock(), vec![(20, "after")]);
    }

    #[test]
    fn test_reentrant_start_is_rejected() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let result = Arc::new(Mutex::new(None));
        {
            let inner = Arc::clone(&scheduler);
            let result = Arc::clone(&result);
            scheduler.schedule_absolute(
                1,
                Box::new(move || {
                    *result.lock() = Some(inner.start());
                }),
            );
        }

        scheduler.start().unwrap();
        assert!(matches!(*result.lock(), Some(Err(RxError::SchedulerRunning))));
    }

    #[test]
    fn test_panicking_action_releases_the_loop() {
        let scheduler = Arc::new(VirtualTimeScheduler::new(0));
        let log = Arc::new(Mutex::new(Vec::new()));
        scheduler.schedule_absolute(10, Box::new(|| panic!("action failed")));
        log_at(&scheduler, &log, 20, "after");

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| scheduler.start()));
        assert!(outcome.is_err());
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.now(), 10);

        scheduler.start().unwrap();
        assert_eq!(*log.lock(), vec![(20, "after")]);
    }
}
