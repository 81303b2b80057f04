use super::config::Strategy;
use super::projection::project;
use super::scheduler::{CoalescingKey, FlushScheduler, WriteJob};
use crate::core::PersistError;
use crate::state::StateStore;
use crate::storage::StorageHandle;

/// Turns one strategy plus the current store state into a scheduled write.
#[derive(Debug, Clone)]
pub struct StrategyWriter {
    scheduler: FlushScheduler,
    default_storage: StorageHandle,
}

impl StrategyWriter {
    pub fn new(scheduler: FlushScheduler, default_storage: StorageHandle) -> Self {
        Self {
            scheduler,
            default_storage,
        }
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        &self.scheduler
    }

    pub fn default_storage(&self) -> &StorageHandle {
        &self.default_storage
    }

    /// Snapshot the store now and schedule the write under the strategy's
    /// flush policy. Failures are reported, never returned.
    pub fn write<S>(&self, strategy: &Strategy, store: &S)
    where
        S: StateStore + ?Sized,
    {
        let target = strategy.resolve(store.id(), &self.default_storage);
        let state = project(store.snapshot(), target.paths);
        let coalescing = CoalescingKey::new(&target.storage, &target.key);

        let key = target.key;
        let storage = target.storage;
        let job = WriteJob::new(move || {
            let text = serde_json::to_string(&state).map_err(|e| PersistError::write(&key, e))?;
            storage
                .set(&key, &text)
                .map_err(|e| PersistError::write(&key, e))
        });

        self.scheduler.schedule(coalescing, target.flush, job);
    }
}
