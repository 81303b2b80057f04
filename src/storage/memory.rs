use super::{StorageBackend, StorageHandle};
use crate::core::StorageError;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

/// In-memory backend.
///
/// Doubles as the session-scoped default storage and as the test double:
/// every `set` is recorded and both directions can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RefCell<HashMap<String, String>>,
    set_calls: RefCell<Vec<(String, String)>>,
    get_calls: Cell<usize>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a value without recording it as a `set` call
    pub fn with_entry(self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Every `(key, value)` passed to `set`, in call order
    pub fn set_calls(&self) -> Vec<(String, String)> {
        self.set_calls.borrow().clone()
    }

    pub fn get_count(&self) -> usize {
        self.get_calls.get()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.get_calls.set(self.get_calls.get() + 1);
        if self.fail_reads.get() {
            return Err(StorageError::Backend(format!("read of '{}' refused", key)));
        }
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.set_calls
            .borrow_mut()
            .push((key.to_string(), value.to_string()));
        if self.fail_writes.get() {
            return Err(StorageError::Backend(format!("write of '{}' refused", key)));
        }
        self.insert(key, value);
        Ok(())
    }
}

thread_local! {
    static SESSION_STORAGE: StorageHandle = StorageHandle::new(MemoryBackend::new());
}

/// Default storage for the current thread.
///
/// Handles are `Rc`-based, so each thread gets its own backend; everything on
/// one thread shares it for the life of that thread.
pub fn session_storage() -> StorageHandle {
    SESSION_STORAGE.with(|handle| handle.clone())
}
