//! Recorded test sources.

use super::{Recorded, SubscriptionLog};
use crate::scheduler::{ScheduledTask, Scheduler, VirtualTimeScheduler};
use crate::subscription::{Observer, Operator, OperatorCore, Subscribable, Subscription};
use crate::types::{Notification, Tick, Value};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

const HOT_NAME: &str = "test:hot";
const COLD_NAME: &str = "test:cold";

type Messages<T> = Vec<Recorded<Notification<T>>>;

fn open_log(logs: &Mutex<Vec<SubscriptionLog>>, now: Tick) -> usize {
    let mut logs = logs.lock();
    logs.push(SubscriptionLog::new(now, Tick::MAX));
    logs.len() - 1
}

fn close_log(logs: &Mutex<Vec<SubscriptionLog>>, index: usize, now: Tick) {
    if let Some(log) = logs.lock().get_mut(index) {
        log.unsubscribe = now;
    }
}

struct HotShared<T> {
    observers: Mutex<Vec<(u64, Arc<dyn Observer<T>>)>>,
    subscriptions: Mutex<Vec<SubscriptionLog>>,
    next_id: AtomicU64,
}

/// Source whose messages fire at absolute ticks, whether or not anyone is
/// subscribed.
pub struct HotObservable<T> {
    scheduler: Arc<VirtualTimeScheduler>,
    messages: Messages<T>,
    shared: Arc<HotShared<T>>,
}

impl<T: Value> HotObservable<T> {
    /// Schedule `messages` on `scheduler` right away.
    pub fn new(scheduler: Arc<VirtualTimeScheduler>, messages: Messages<T>) -> Self {
        let shared = Arc::new(HotShared {
            observers: Mutex::new(Vec::new()),
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        });

        for message in &messages {
            let shared = Arc::downgrade(&shared);
            let notification = message.value.clone();
            scheduler.schedule_absolute(
                message.time,
                Box::new(move || {
                    let Some(shared) = shared.upgrade() else {
                        return;
                    };
                    let observers: Vec<_> = shared
                        .observers
                        .lock()
                        .iter()
                        .map(|(_, observer)| Arc::clone(observer))
                        .collect();
                    for observer in observers {
                        notification.clone().accept(&*observer);
                    }
                }),
            );
        }

        Self {
            scheduler,
            messages,
            shared,
        }
    }

    pub fn messages(&self) -> &[Recorded<Notification<T>>] {
        &self.messages
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.shared.subscriptions.lock().clone()
    }
}

impl<T: Value> Subscribable<T> for HotObservable<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let log = open_log(&self.shared.subscriptions, self.scheduler.now());
        let op = Arc::new(HotSubscription {
            core: OperatorCore::new(),
            id: self.shared.next_id.fetch_add(1, Ordering::SeqCst),
            observer,
            shared: Arc::clone(&self.shared),
            scheduler: Arc::clone(&self.scheduler),
            log,
        });
        Subscription::new(op, Vec::new())
    }
}

struct HotSubscription<T> {
    core: OperatorCore,
    id: u64,
    observer: Arc<dyn Observer<T>>,
    shared: Arc<HotShared<T>>,
    scheduler: Arc<VirtualTimeScheduler>,
    log: usize,
}

impl<T: Value> Operator for HotSubscription<T> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        HOT_NAME
    }

    fn is_stateful(&self) -> bool {
        false
    }

    fn on_start(&self) {
        self.shared
            .observers
            .lock()
            .push((self.id, Arc::clone(&self.observer)));
    }

    fn on_dispose(&self) {
        self.shared.observers.lock().retain(|(id, _)| *id != self.id);
        close_log(&self.shared.subscriptions, self.log, self.scheduler.now());
    }
}

/// Source that replays its messages relative to each subscription.
pub struct ColdObservable<T> {
    scheduler: Arc<VirtualTimeScheduler>,
    messages: Arc<Messages<T>>,
    subscriptions: Arc<Mutex<Vec<SubscriptionLog>>>,
}

impl<T: Value> ColdObservable<T> {
    pub fn new(scheduler: Arc<VirtualTimeScheduler>, messages: Messages<T>) -> Self {
        Self {
            scheduler,
            messages: Arc::new(messages),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn messages(&self) -> &[Recorded<Notification<T>>] {
        &self.messages
    }

    pub fn subscriptions(&self) -> Vec<SubscriptionLog> {
        self.subscriptions.lock().clone()
    }
}

impl<T: Value> Subscribable<T> for ColdObservable<T> {
    fn subscribe(&self, observer: Arc<dyn Observer<T>>) -> Subscription {
        let log = open_log(&self.subscriptions, self.scheduler.now());
        let op = Arc::new_cyclic(|me| ColdSubscription {
            core: OperatorCore::new(),
            me: me.clone(),
            observer,
            messages: Arc::clone(&self.messages),
            tasks: Mutex::new(Vec::new()),
            subscriptions: Arc::clone(&self.subscriptions),
            scheduler: Arc::clone(&self.scheduler),
            log,
        });
        Subscription::new(op, Vec::new())
    }
}

struct ColdSubscription<T> {
    core: OperatorCore,
    me: Weak<ColdSubscription<T>>,
    observer: Arc<dyn Observer<T>>,
    messages: Arc<Messages<T>>,
    tasks: Mutex<Vec<ScheduledTask>>,
    subscriptions: Arc<Mutex<Vec<SubscriptionLog>>>,
    scheduler: Arc<VirtualTimeScheduler>,
    log: usize,
}

impl<T: Value> ColdSubscription<T> {
    fn deliver(&self, notification: Notification<T>) {
        if self.core.is_running() {
            notification.accept(&*self.observer);
        }
    }
}

impl<T: Value> Operator for ColdSubscription<T> {
    fn core(&self) -> &OperatorCore {
        &self.core
    }

    fn name(&self) -> &'static str {
        COLD_NAME
    }

    fn is_stateful(&self) -> bool {
        false
    }

    fn on_start(&self) {
        let start = self.scheduler.now();
        let tasks: Vec<ScheduledTask> = self
            .messages
            .iter()
            .map(|message| {
                let me = self.me.clone();
                let notification = message.value.clone();
                self.scheduler.schedule_absolute(
                    start.saturating_add(message.time),
                    Box::new(move || {
                        if let Some(op) = me.upgrade() {
                            op.deliver(notification);
                        }
                    }),
                )
            })
            .collect();
        self.tasks.lock().extend(tasks);
    }

    fn on_dispose(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            task.cancel();
        }
        close_log(&self.subscriptions, self.log, self.scheduler.now());
    }
}
