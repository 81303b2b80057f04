pub mod error;
pub mod report;

pub use error::{HydrationFailure, PersistError, Result, StateError, StorageError, WriteFailure};
pub use report::ErrorReporter;
