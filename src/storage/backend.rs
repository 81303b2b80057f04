use crate::core::StorageError;
use std::fmt;
use std::rc::Rc;

/// Storage backend trait - any synchronous text key-value store
pub trait StorageBackend {
    /// Read the text stored under `key`, `None` when nothing is stored
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

/// Shared handle to a backend with a stable identity.
///
/// The identity is the backend allocation: every handle over the same `Rc`
/// (clones or separate `from_rc` calls) coalesces together, handles over
/// different backends never do. The handle keeps the allocation alive, so
/// an identity cannot be reused while the handle or a pending write exists.
#[derive(Clone)]
pub struct StorageHandle {
    id: usize,
    backend: Rc<dyn StorageBackend>,
}

impl StorageHandle {
    pub fn new<B: StorageBackend + 'static>(backend: B) -> Self {
        Self::from_rc(Rc::new(backend))
    }

    /// Wrap a backend the caller keeps its own reference to (e.g. a test double).
    pub fn from_rc(backend: Rc<dyn StorageBackend>) -> Self {
        Self {
            id: Rc::as_ptr(&backend) as *const () as usize,
            backend,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.backend.get(key)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backend.set(key, value)
    }
}

impl fmt::Debug for StorageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for StorageHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for StorageHandle {}
