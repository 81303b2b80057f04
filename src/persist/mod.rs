//! Store persistence: hydration on attach, scheduled writes on change.
//!
//! - **config**: per-store settings (`PersistConfig`, `Strategy`, `FlushPolicy`, `Paths`)
//! - **projection**: selecting the persisted subset of a snapshot
//! - **executor**: host deferred-execution primitives (`MicrotaskQueue`, `UnloadSignal`)
//! - **scheduler**: flush timing and write coalescing (`FlushScheduler`)
//! - **writer**: one strategy, one scheduled write (`StrategyWriter`)
//! - **coordinator**: per-store wiring (`Persistence::attach`)

pub mod config;
pub mod coordinator;
pub mod executor;
pub mod projection;
pub mod scheduler;
pub mod writer;

pub use config::{FlushPolicy, Paths, PersistConfig, ResolvedStrategy, Strategy};
pub use coordinator::Persistence;
pub use executor::{DeferredExecutor, Host, MicrotaskQueue, Task, UnloadSignal};
pub use projection::project;
pub use scheduler::{CoalescingKey, FlushScheduler, WriteJob};
pub use writer::StrategyWriter;
