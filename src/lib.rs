// ============================================================================
// store_persist Library
// ============================================================================

//! Persist reactive application state to key-value storage.
//!
//! Attach a [`PersistConfig`] to a store and every change is written to
//! storage according to each strategy's [`FlushPolicy`]: immediately, once
//! per microtask drain, or once when the host is about to terminate. Stored
//! state is merged back into the store when it is attached.
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//! use serde_json::json;
//! use store_persist::{
//!     ErrorReporter, FlushPolicy, FlushScheduler, Host, MemoryBackend, MicrotaskQueue,
//!     PersistConfig, Persistence, StorageHandle, Store, Strategy, UnloadSignal,
//! };
//!
//! let microtasks = Rc::new(MicrotaskQueue::new());
//! let unload = Rc::new(UnloadSignal::new());
//! let scheduler = FlushScheduler::new(
//!     Host::new(microtasks.clone(), unload.clone()),
//!     ErrorReporter::new(),
//! );
//!
//! let storage = Rc::new(MemoryBackend::new());
//! let persistence = Persistence::new(scheduler)
//!     .default_storage(StorageHandle::from_rc(storage.clone()));
//!
//! let store = Rc::new(Store::from_value("counter", json!({ "count": 0 })).unwrap());
//! let config = PersistConfig::enabled()
//!     .strategy(Strategy::new().flush(FlushPolicy::DeferredMicrotask));
//! persistence.attach(&config, &store);
//!
//! store.set("count", json!(1));
//! store.set("count", json!(2));
//! microtasks.drain();
//!
//! assert_eq!(storage.set_calls().len(), 1);
//! assert_eq!(storage.value("counter"), Some("{\"count\":2}".to_string()));
//! ```

pub mod core;
pub mod persist;
pub mod state;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{ErrorReporter, PersistError, Result, StateError, StorageError};
pub use crate::persist::{
    CoalescingKey, DeferredExecutor, FlushPolicy, FlushScheduler, Host, MicrotaskQueue, Paths,
    PersistConfig, Persistence, Strategy, StrategyWriter, UnloadSignal, WriteJob,
};
pub use crate::state::{StateStore, Store, SubscriptionId};
pub use crate::storage::{FileBackend, MemoryBackend, StorageBackend, StorageHandle, session_storage};
