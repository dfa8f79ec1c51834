//! Sampling by period or by a sampler sequence.
//!
//! Both forms keep the latest unsampled value. At each sample point it is
//! emitted and cleared; nothing is emitted if no value arrived since the last
//! point. Source completion flushes the pending value before completing.
//! An error on either input terminates the sequence and disposes both.

use super::{complete, fail};
use crate::codec::{Persist, StateReader, StateWriter};
use crate::error::{Result, RxError, SequenceError};
use crate::scheduler::ScheduledTask;
use crate::subscription::{Downstream, Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Tick, Value, Version};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

pub(crate) const PERIOD_NAME: &str = "rx:sample/period";
pub(crate) const SAMPLER_NAME: &str = "rx:sample/sampler";
pub(crate) const PERIOD_VERSION: Version = Version::V1;
pub(crate) const SAMPLER_VERSION: Version = Version::V1;

/// Samples the source every `period` ticks, starting one period after
/// subscription.
pub struct Sample<T> {
    source: Arc<dyn Subscribable<T>>,
    period: Tick,
}

impl<T: Value + Persist> Sample<T> {
    pub fn new(source: Arc<dyn Subscribable<T>>, period: Tick) -> Result<Self> {
        if period <= 0 {
            return Err(RxError::invalid_argument(
                "period",
                format!("must be positive, got {}", period),
            ));
        }
        Ok(Self { source, period })
    }
}

impl<T: Value + Persist> Subscribable<T> for Sample<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let op = Arc::new_cyclic(|me| PeriodicOperator {
            core: OperatorCore::new(),
            me: me.clone(),
            downstream: Downstream::new(observer),
            period: self.period,
            state: Mutex::new(PeriodicState {
                pending: None,
                next_due: None,
                timer: None,
            }),
        });
        let upstream = self.source.subscribe(op.clone());
        Subscription::new(op, vec![upstream])
    }
}

struct PeriodicState<T> {
    pending: Option<T>,
    /// Phase of the timer; `None` until first started.
    next_due: Option<Tick>,
    timer: Option<ScheduledTask>,
}

struct PeriodicOperator<T> {
    core: OperatorCore,
    me: Weak<PeriodicOperator<T>>,
    downstream: Downstream<T>,
    period: Tick,
    state: Mutex<PeriodicState<T>>,
}

impl<T: Value + Persist> PeriodicOperator<T> {
    fn schedule(&self, due: Tick) {
        let Some(scheduler) = self.core.scheduler() else {
            return;
        };
        let me = self.me.clone();
        let task = scheduler.schedule_absolute(
            due,
            Box::new(move || {
                if let Some(op) = me.upgrade() {
                    op.tick(due);
                }
            }),
        );
        self.state.lock().timer = Some(task);
    }

    fn tick(&self, due: Tick) {
        if !self.core.is_running() {
            return;
        }
        let Some(now) = self.core.scheduler().map(|s| s.now()) else {
            return;
        };

        let (value, next) = {
            let mut state = self.state.lock();
            state.timer = None;
            let mut next = due.saturating_add(self.period);
            if next <= now {
                // Missed periods collapse into this one tick.
                next = next.saturating_add(((now - next) / self.period + 1) * self.period);
            }
            state.next_due = Some(next);
            (state.pending.take(), next)
        };

        if let Some(value) = value {
            self.downstream.next(value);
        }
        if self.core.is_running() {
            self.schedule(next);
        }
    }
}

impl<T: Value + Persist> Operator for PeriodicOperator<T> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        PERIOD_NAME
    }

    fn version(&self) -> Version {
        PERIOD_VERSION
    }

    fn on_start(&self) {
        let Some(now) = self.core.scheduler().map(|s| s.now()) else {
            return;
        };
        let due = *self
            .state
            .lock()
            .next_due
            .get_or_insert(now.saturating_add(self.period));
        if due < now {
            tracing::debug!(due, now, period = self.period, "periodic sample resumed past its due tick");
        }
        self.schedule(due);
    }

    fn save_state(&self, writer: &mut StateWriter) {
        let state = self.state.lock();
        writer.write(&state.pending);
        writer.write(&state.next_due);
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        let mut state = self.state.lock();
        state.pending = reader.read()?;
        state.next_due = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        let timer = self.state.lock().timer.take();
        if let Some(timer) = timer {
            timer.cancel();
        }
        self.downstream.release();
    }
}

impl<T: Value + Persist> Observer<T> for PeriodicOperator<T> {
    fn on_next(&self, value: T) {
        if self.core.accepts(PERIOD_NAME) {
            self.state.lock().pending = Some(value);
        }
    }

    fn on_error(&self, error: SequenceError) {
        if self.core.accepts(PERIOD_NAME) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_completed(&self) {
        if !self.core.accepts(PERIOD_NAME) {
            return;
        }
        let pending = self.state.lock().pending.take();
        if let Some(value) = pending {
            self.downstream.next(value);
        }
        complete(&self.core, &self.downstream);
    }
}

/// Samples the source whenever the sampler produces an element.
///
/// Once the sampler completes no further samples are taken; the pending value
/// is still flushed when the source completes.
pub struct SampleWith<T, U> {
    source: Arc<dyn Subscribable<T>>,
    sampler: Arc<dyn Subscribable<U>>,
}

impl<T: Value + Persist, U: Value> SampleWith<T, U> {
    pub fn new(source: Arc<dyn Subscribable<T>>, sampler: Arc<dyn Subscribable<U>>) -> Self {
        Self { source, sampler }
    }
}

impl<T: Value + Persist, U: Value> Subscribable<T> for SampleWith<T, U> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let op = Arc::new(SamplerOperator {
            core: OperatorCore::new(),
            downstream: Downstream::new(observer),
            state: Mutex::new(SamplerState {
                pending: None,
                sampler_done: false,
            }),
        });
        let source = self.source.subscribe(op.clone());
        let sampler = self.sampler.subscribe(Arc::new(SamplerInput {
            parent: Arc::clone(&op),
        }));
        Subscription::new(op, vec![source, sampler])
    }
}

struct SamplerState<T> {
    pending: Option<T>,
    sampler_done: bool,
}

struct SamplerOperator<T> {
    core: OperatorCore,
    downstream: Downstream<T>,
    state: Mutex<SamplerState<T>>,
}

impl<T: Value + Persist> SamplerOperator<T> {
    fn sample(&self) {
        if !self.core.accepts(SAMPLER_NAME) {
            return;
        }
        let value = {
            let mut state = self.state.lock();
            if state.sampler_done {
                None
            } else {
                state.pending.take()
            }
        };
        if let Some(value) = value {
            self.downstream.next(value);
        }
    }

    fn sampler_completed(&self) {
        if self.core.accepts(SAMPLER_NAME) {
            self.state.lock().sampler_done = true;
        }
    }
}

impl<T: Value + Persist> Operator for SamplerOperator<T> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        SAMPLER_NAME
    }

    fn version(&self) -> Version {
        SAMPLER_VERSION
    }

    fn save_state(&self, writer: &mut StateWriter) {
        let state = self.state.lock();
        writer.write(&state.pending);
        writer.write(&state.sampler_done);
    }

    fn load_state(&self, reader: &mut StateReader<'_>, _version: Version) -> Result<()> {
        let mut state = self.state.lock();
        state.pending = reader.read()?;
        state.sampler_done = reader.read()?;
        Ok(())
    }

    fn on_dispose(&self) {
        self.downstream.release();
    }
}

impl<T: Value + Persist> Observer<T> for SamplerOperator<T> {
    fn on_next(&self, value: T) {
        if self.core.accepts(SAMPLER_NAME) {
            self.state.lock().pending = Some(value);
        }
    }

    fn on_error(&self, error: SequenceError) {
        if self.core.accepts(SAMPLER_NAME) {
            fail(&self.core, &self.downstream, error);
        }
    }

    fn on_completed(&self) {
        if !self.core.accepts(SAMPLER_NAME) {
            return;
        }
        let pending = self.state.lock().pending.take();
        if let Some(value) = pending {
            self.downstream.next(value);
        }
        complete(&self.core, &self.downstream);
    }
}

/// Sampler-side input of [`SamplerOperator`].
struct SamplerInput<T> {
    parent: Arc<SamplerOperator<T>>,
}

impl<T: Value + Persist, U> Observer<U> for SamplerInput<T> {
    fn on_next(&self, _value: U) {
        self.parent.sample();
    }

    fn on_error(&self, error: SequenceError) {
        Observer::<T>::on_error(&*self.parent, error);
    }

    fn on_completed(&self) {
        self.parent.sampler_completed();
    }
}
