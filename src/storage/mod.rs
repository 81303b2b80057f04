pub mod backend;
pub mod file;
pub mod memory;

pub use backend::{StorageBackend, StorageHandle};
pub use file::FileBackend;
pub use memory::{MemoryBackend, session_storage};
