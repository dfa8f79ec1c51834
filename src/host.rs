//! Query host tying subscriptions to a scheduler and a checkpoint store.

use crate::checkpoint::{self, CheckpointStore};
use crate::error::{Result, RxError};
use crate::scheduler::Scheduler;
use crate::settings::Settings;
use crate::subscription::{OperatorContext, Subscription, SubscriptionVisitor};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a fresh, uninitialized subscription. Called again on recovery.
pub type SubscriptionFactory = Arc<dyn Fn() -> Subscription + Send + Sync>;

struct Instance {
    factory: SubscriptionFactory,
    subscription: Subscription,
}

/// Named subscription instances sharing one scheduler and settings bag.
pub struct QueryHost {
    scheduler: Arc<dyn Scheduler>,
    settings: Arc<Settings>,
    store: Arc<dyn CheckpointStore>,
    instances: RwLock<BTreeMap<String, Instance>>,
}

impl QueryHost {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        settings: Arc<Settings>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            scheduler,
            settings,
            store,
            instances: RwLock::new(BTreeMap::new()),
        }
    }

    fn context(&self, id: &str) -> OperatorContext {
        OperatorContext::new(Arc::clone(&self.scheduler), Arc::clone(&self.settings))
            .with_instance_id(id)
    }

    /// Subscribe and initialize a new instance.
    pub fn deploy<F>(&self, id: &str, factory: F) -> Result<()>
    where
        F: Fn() -> Subscription + Send + Sync + 'static,
    {
        if self.instances.read().contains_key(id) {
            return Err(RxError::SubscriptionExists(id.to_string()));
        }

        let factory: SubscriptionFactory = Arc::new(factory);
        let subscription = factory();
        if let Err(e) = SubscriptionVisitor::new(&subscription).initialize(&self.context(id)) {
            subscription.dispose();
            return Err(e);
        }

        let mut instances = self.instances.write();
        if instances.contains_key(id) {
            subscription.dispose();
            return Err(RxError::SubscriptionExists(id.to_string()));
        }
        instances.insert(
            id.to_string(),
            Instance {
                factory,
                subscription,
            },
        );

        tracing::info!(id, "deployed subscription");
        Ok(())
    }

    /// Dispose an instance and drop its checkpoint.
    pub fn undeploy(&self, id: &str) -> Result<()> {
        let instance = self
            .instances
            .write()
            .remove(id)
            .ok_or_else(|| RxError::SubscriptionNotFound(id.to_string()))?;
        instance.subscription.dispose();
        self.store.remove(id)?;

        tracing::info!(id, "undeployed subscription");
        Ok(())
    }

    /// Save every live instance to the store. Returns the number saved.
    pub fn checkpoint(&self) -> Result<usize> {
        let snapshots: Vec<(String, Subscription)> = self
            .instances
            .read()
            .iter()
            .map(|(id, instance)| (id.clone(), instance.subscription.clone()))
            .collect();

        for (id, subscription) in &snapshots {
            let bytes = checkpoint::save(subscription);
            self.store.put(id, bytes)?;
        }

        tracing::info!(instances = snapshots.len(), "checkpointed host");
        Ok(snapshots.len())
    }

    /// Replace every instance with a fresh one restored from its stored
    /// checkpoint, if any. Returns the number restored from a checkpoint.
    ///
    /// The stored checkpoint is loaded into the fresh tree before the
    /// running instance is touched. If that fails, the running instance is
    /// kept. If the fresh tree then fails to initialize, the instance is
    /// removed. Every instance is attempted; failures are reported together
    /// as [`RxError::RecoveryFailed`].
    pub fn recover(&self) -> Result<usize> {
        let ids: Vec<String> = self.instances.read().keys().cloned().collect();
        let mut restored = 0;
        let mut failed = Vec::new();

        for id in ids {
            let entry = self
                .instances
                .read()
                .get(&id)
                .map(|instance| (Arc::clone(&instance.factory), instance.subscription.clone()));
            let Some((factory, previous)) = entry else {
                continue;
            };

            let subscription = factory();
            let saved = match self.store.get(&id) {
                Ok(saved) => saved,
                Err(e) => {
                    subscription.dispose();
                    tracing::warn!(id = %id, error = %e, "failed to read checkpoint, keeping instance");
                    failed.push(id);
                    continue;
                }
            };
            if let Some(bytes) = &saved {
                if let Err(e) = checkpoint::load(&subscription, bytes) {
                    subscription.dispose();
                    tracing::warn!(id = %id, error = %e, "failed to load checkpoint, keeping instance");
                    failed.push(id);
                    continue;
                }
            }

            previous.dispose();
            if let Err(e) = SubscriptionVisitor::new(&subscription).initialize(&self.context(&id)) {
                subscription.dispose();
                self.instances.write().remove(&id);
                tracing::warn!(id = %id, error = %e, "failed to initialize recovered subscription, removed");
                failed.push(id);
                continue;
            }

            if saved.is_some() {
                restored += 1;
            }
            if let Some(instance) = self.instances.write().get_mut(&id) {
                instance.subscription = subscription;
            }
        }

        if !failed.is_empty() {
            tracing::warn!(restored, failed = failed.len(), "recovered host with failures");
            return Err(RxError::RecoveryFailed { restored, failed });
        }
        tracing::info!(restored, "recovered host");
        Ok(restored)
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.instances
            .read()
            .get(id)
            .map(|instance| instance.subscription.clone())
    }

    /// Deployed ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.instances.read().keys().cloned().collect()
    }

    /// Dispose every instance without removing checkpoints.
    pub fn shutdown(&self) {
        let instances = std::mem::take(&mut *self.instances.write());
        for (_, instance) in instances {
            instance.subscription.dispose();
        }
        tracing::info!("host shut down");
    }
}
