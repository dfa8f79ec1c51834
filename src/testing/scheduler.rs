use super::{ColdObservable, HotObservable, Recorded, TestObserver};
use crate::checkpoint;
use crate::error::{Result, RxError};
use crate::scheduler::{Scheduler, VirtualTimeScheduler};
use crate::settings::Settings;
use crate::subscription::{OperatorContext, Subscribable, Subscription, SubscriptionVisitor};
use crate::types::{Notification, Tick, Value};
use parking_lot::Mutex;
use std::sync::Arc;

/// Default tick at which the pipeline is constructed.
pub const CREATED: Tick = 100;

/// Default tick at which the pipeline is subscribed and initialized.
pub const SUBSCRIBED: Tick = 200;

/// Default tick at which the subscription is disposed.
pub const DISPOSED: Tick = 1000;

/// Virtual-time scheduler plus the settings handed to every pipeline.
pub struct TestScheduler {
    scheduler: Arc<VirtualTimeScheduler>,
    settings: Arc<Settings>,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::with_settings(Settings::new())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            scheduler: Arc::new(VirtualTimeScheduler::new(0)),
            settings: Arc::new(settings),
        }
    }

    pub fn scheduler(&self) -> &Arc<VirtualTimeScheduler> {
        &self.scheduler
    }

    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    pub fn now(&self) -> Tick {
        self.scheduler.now()
    }

    pub fn context(&self) -> OperatorContext {
        let scheduler: Arc<dyn Scheduler> = self.scheduler.clone();
        OperatorContext::new(scheduler, Arc::clone(&self.settings))
    }

    pub fn create_hot_observable<T: Value>(
        &self,
        messages: Vec<Recorded<Notification<T>>>,
    ) -> Arc<HotObservable<T>> {
        Arc::new(HotObservable::new(Arc::clone(&self.scheduler), messages))
    }

    pub fn create_cold_observable<T: Value>(
        &self,
        messages: Vec<Recorded<Notification<T>>>,
    ) -> Arc<ColdObservable<T>> {
        Arc::new(ColdObservable::new(Arc::clone(&self.scheduler), messages))
    }

    pub fn create_observer<T: Value>(&self) -> Arc<TestObserver<T>> {
        Arc::new(TestObserver::new(Arc::clone(&self.scheduler)))
    }

    /// Run the default timeline: create, subscribe, dispose.
    pub fn start<T, S, F>(&self, create: F) -> Result<Arc<TestObserver<T>>>
    where
        T: Value,
        S: Subscribable<T> + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        self.run(TestRun::new(create))
    }

    /// Run `run` to completion; the first checkpoint or initialization
    /// failure is returned.
    pub fn run<T: Value>(&self, run: TestRun<T>) -> Result<Arc<TestObserver<T>>> {
        let observer = self.create_observer::<T>();
        let state = Arc::new(RunState {
            source: Mutex::new(None),
            subscription: Mutex::new(None),
            checkpoint: Mutex::new(run.initial.clone()),
            error: Mutex::new(None),
        });

        {
            let state = Arc::clone(&state);
            let create = Arc::clone(&run.create);
            self.scheduler.schedule_absolute(
                run.created,
                Box::new(move || {
                    *state.source.lock() = Some(create());
                }),
            );
        }

        {
            let state = Arc::clone(&state);
            let observer = Arc::clone(&observer);
            let context = self.context();
            let restore = run.initial.is_some();
            self.scheduler.schedule_absolute(
                run.subscribed,
                Box::new(move || state.attach(&observer, &context, restore)),
            );
        }

        for time in &run.saves {
            let state = Arc::clone(&state);
            self.scheduler.schedule_absolute(
                *time,
                Box::new(move || {
                    let subscription = state.subscription.lock().clone();
                    if let Some(subscription) = subscription {
                        let bytes = checkpoint::save(&subscription);
                        *state.checkpoint.lock() = Some(bytes);
                    }
                }),
            );
        }

        for time in &run.loads {
            let state = Arc::clone(&state);
            let observer = Arc::clone(&observer);
            let context = self.context();
            self.scheduler.schedule_absolute(
                *time,
                Box::new(move || {
                    let previous = state.subscription.lock().take();
                    if let Some(previous) = previous {
                        previous.dispose();
                    }
                    state.attach(&observer, &context, true);
                }),
            );
        }

        {
            let state = Arc::clone(&state);
            self.scheduler.schedule_absolute(
                run.disposed,
                Box::new(move || {
                    let subscription = state.subscription.lock().take();
                    if let Some(subscription) = subscription {
                        subscription.dispose();
                    }
                }),
            );
        }

        self.scheduler.start()?;

        let error = state.error.lock().take();
        match error {
            Some(error) => Err(error),
            None => Ok(observer),
        }
    }
}

impl Default for TestScheduler {
    fn default() -> Self {
        Self::new()
    }
}

type Factory<T> = Arc<dyn Fn() -> Arc<dyn Subscribable<T>> + Send + Sync>;

/// Timeline for one pipeline under test.
pub struct TestRun<T> {
    create: Factory<T>,
    created: Tick,
    subscribed: Tick,
    disposed: Tick,
    saves: Vec<Tick>,
    loads: Vec<Tick>,
    initial: Option<Vec<u8>>,
}

impl<T: Value> TestRun<T> {
    pub fn new<S, F>(create: F) -> Self
    where
        S: Subscribable<T> + 'static,
        F: Fn() -> S + Send + Sync + 'static,
    {
        Self {
            create: Arc::new(move || -> Arc<dyn Subscribable<T>> { Arc::new(create()) }),
            created: CREATED,
            subscribed: SUBSCRIBED,
            disposed: DISPOSED,
            saves: Vec::new(),
            loads: Vec::new(),
            initial: None,
        }
    }

    pub fn created(mut self, time: Tick) -> Self {
        self.created = time;
        self
    }

    pub fn subscribed(mut self, time: Tick) -> Self {
        self.subscribed = time;
        self
    }

    pub fn disposed(mut self, time: Tick) -> Self {
        self.disposed = time;
        self
    }

    /// Save a checkpoint of the live subscription at `time`.
    pub fn save_at(mut self, time: Tick) -> Self {
        self.saves.push(time);
        self
    }

    /// At `time`, dispose the live subscription and resubscribe the same
    /// observer from the most recent checkpoint.
    pub fn load_at(mut self, time: Tick) -> Self {
        self.loads.push(time);
        self
    }

    /// Restore the first subscription from `checkpoint` instead of starting
    /// fresh.
    pub fn from_checkpoint(mut self, checkpoint: Vec<u8>) -> Self {
        self.initial = Some(checkpoint);
        self
    }
}

struct RunState<T> {
    source: Mutex<Option<Arc<dyn Subscribable<T>>>>,
    subscription: Mutex<Option<Subscription>>,
    checkpoint: Mutex<Option<Vec<u8>>>,
    error: Mutex<Option<RxError>>,
}

impl<T: Value> RunState<T> {
    /// Subscribe `observer`, optionally restore the last checkpoint, then
    /// initialize.
    fn attach(&self, observer: &Arc<TestObserver<T>>, context: &OperatorContext, restore: bool) {
        let source = self.source.lock().clone();
        let Some(source) = source else {
            self.record(RxError::invalid_argument(
                "subscribed",
                "pipeline subscribed before it was created",
            ));
            return;
        };

        let subscription = source.subscribe(observer.clone());
        let saved = if restore {
            self.checkpoint.lock().clone()
        } else {
            None
        };

        let result = match saved {
            Some(bytes) => checkpoint::load(&subscription, &bytes),
            None => Ok(()),
        }
        .and_then(|()| SubscriptionVisitor::new(&subscription).initialize(context));

        match result {
            Ok(()) => *self.subscription.lock() = Some(subscription),
            Err(error) => {
                subscription.dispose();
                self.record(error);
            }
        }
    }

    fn record(&self, error: RxError) {
        let mut slot = self.error.lock();
        if slot.is_none() {
            *slot = Some(error);
        }
    }
}
