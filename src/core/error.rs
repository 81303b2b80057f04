use thiserror::Error;

/// Failure raised by a storage backend's `get` or `set`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Failure raised by a state container while applying a patch.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("state must be a JSON object (found {0})")]
    NotAnObject(&'static str),

    #[error("patch rejected: {0}")]
    Rejected(String),
}

/// Cause of a failed flush.
#[derive(Error, Debug)]
pub enum WriteFailure {
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("storage set failed: {0}")]
    Storage(#[from] StorageError),
}

/// Cause of a skipped hydration.
#[derive(Error, Debug)]
pub enum HydrationFailure {
    #[error("storage get failed: {0}")]
    Storage(#[from] StorageError),

    #[error("stored text is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("stored value is not an object (found {0})")]
    NotAnObject(&'static str),

    #[error("merge into store failed: {0}")]
    Patch(#[from] StateError),
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to persist state to storage key '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: WriteFailure,
    },

    #[error("Failed to restore state from storage key '{key}': {source}")]
    Hydration {
        key: String,
        #[source]
        source: HydrationFailure,
    },

    #[error("Invalid persist configuration: {0}")]
    Config(String),
}

impl PersistError {
    pub fn write(key: impl Into<String>, source: impl Into<WriteFailure>) -> Self {
        Self::Write {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn hydration(key: impl Into<String>, source: impl Into<HydrationFailure>) -> Self {
        Self::Hydration {
            key: key.into(),
            source: source.into(),
        }
    }

    /// Storage key the failure is attached to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Write { key, .. } | Self::Hydration { key, .. } => Some(key.as_str()),
            Self::Config(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_error_carries_key_and_cause() {
        let err = PersistError::write("prefs", StorageError::Backend("quota".to_string()));
        assert_eq!(err.key(), Some("prefs"));
        let message = err.to_string();
        assert!(message.contains("prefs"));
        assert!(message.contains("quota"));
    }

    #[test]
    fn test_config_error_has_no_key() {
        let err = PersistError::Config("bad".to_string());
        assert_eq!(err.key(), None);
    }
}
