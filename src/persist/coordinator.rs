use super::config::{PersistConfig, Strategy};
use super::scheduler::FlushScheduler;
use super::writer::StrategyWriter;
use crate::core::{ErrorReporter, HydrationFailure, PersistError};
use crate::state::{StateStore, SubscriptionId, json_kind};
use crate::storage::{StorageHandle, session_storage};
use log::debug;
use serde_json::Value;
use std::rc::Rc;

/// Attaches persistence to stores.
///
/// One `Persistence` is usually built per process and shared by every store;
/// it owns the scheduler (and therefore the pending-write table) and the
/// default storage.
#[derive(Debug, Clone)]
pub struct Persistence {
    writer: StrategyWriter,
}

impl Persistence {
    /// Uses the session storage as default backend
    pub fn new(scheduler: FlushScheduler) -> Self {
        Self {
            writer: StrategyWriter::new(scheduler, session_storage()),
        }
    }

    /// Server-side persistence: hydration still runs, writes never do
    pub fn headless() -> Self {
        Self::new(FlushScheduler::headless())
    }

    pub fn default_storage(self, storage: StorageHandle) -> Self {
        Self {
            writer: StrategyWriter::new(self.writer.scheduler().clone(), storage),
        }
    }

    /// Route write and hydration failures to `hook`.
    ///
    /// The reporter lives on the scheduler, so every `Persistence` sharing
    /// it reports through the same hook.
    pub fn on_error<F>(self, hook: F) -> Self
    where
        F: Fn(&PersistError) + 'static,
    {
        self.scheduler().set_reporter(ErrorReporter::with_hook(hook));
        self
    }

    pub fn writer(&self) -> &StrategyWriter {
        &self.writer
    }

    pub fn scheduler(&self) -> &FlushScheduler {
        self.writer.scheduler()
    }

    /// Hook `store` up according to `config`.
    ///
    /// Hydrates every strategy in order, then subscribes so each change
    /// writes every strategy in order. Returns the subscription, or `None`
    /// when the config is not enabled (nothing is read, written or
    /// subscribed in that case).
    pub fn attach<S>(&self, config: &PersistConfig, store: &Rc<S>) -> Option<SubscriptionId>
    where
        S: StateStore + 'static,
    {
        if !config.enabled {
            return None;
        }

        let strategies: Rc<[Strategy]> = config
            .effective_strategies(store.id(), self.writer.default_storage())
            .into();

        for strategy in strategies.iter() {
            self.hydrate(strategy, &**store);
        }

        let writer = self.writer.clone();
        let weak = Rc::downgrade(store);
        let id = store.subscribe(Rc::new(move || {
            let Some(store) = weak.upgrade() else {
                return;
            };
            for strategy in strategies.iter() {
                writer.write(strategy, &*store);
            }
        }));
        Some(id)
    }

    fn hydrate<S>(&self, strategy: &Strategy, store: &S)
    where
        S: StateStore + ?Sized,
    {
        let target = strategy.resolve(store.id(), self.writer.default_storage());
        match restore(&target.storage, &target.key, store) {
            Ok(true) => {
                debug!("persist: hydrated store '{}' from '{}'", store.id(), target.key);
                self.writer.write(strategy, store);
            }
            Ok(false) => {}
            Err(failure) => self
                .scheduler()
                .reporter()
                .report(PersistError::hydration(target.key, failure)),
        }
    }
}

/// Merge whatever is stored under `key` into the store. `Ok(false)` when
/// nothing (or an empty string) is stored.
fn restore<S>(storage: &StorageHandle, key: &str, store: &S) -> Result<bool, HydrationFailure>
where
    S: StateStore + ?Sized,
{
    let text = match storage.get(key)? {
        Some(text) if !text.is_empty() => text,
        _ => return Ok(false),
    };
    match serde_json::from_str::<Value>(&text)? {
        Value::Object(partial) => {
            store.patch(partial)?;
            Ok(true)
        }
        other => Err(HydrationFailure::NotAnObject(json_kind(&other))),
    }
}
