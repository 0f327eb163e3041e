//! Store errors

use casslock_common::CassLockError;

/// Errors reported by a lock table store
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Transport failure or not enough replicas for the requested level
    #[error("store unavailable during {operation}: {message}")]
    Unavailable { operation: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A keyspace snapshot could not be read or written
    #[error("snapshot '{path}': {message}")]
    Snapshot { path: String, message: String },
}

impl StoreError {
    pub fn unavailable(operation: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Unavailable {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn snapshot(path: &std::path::Path, message: impl ToString) -> Self {
        StoreError::Snapshot {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }
}

impl From<StoreError> for CassLockError {
    fn from(err: StoreError) -> Self {
        CassLockError::StoreUnavailable(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion() {
        let err: CassLockError = StoreError::unavailable("write_cell", "timed out").into();
        assert!(matches!(err, CassLockError::StoreUnavailable(_)));
        assert!(err.to_string().contains("write_cell"));

        let err: CassLockError =
            StoreError::snapshot(std::path::Path::new("/tmp/keyspace.json"), "bad json").into();
        assert!(err.to_string().contains("/tmp/keyspace.json"));
    }
}
