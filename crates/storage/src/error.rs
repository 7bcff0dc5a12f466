//! Error types for storage operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object not found in storage.
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to {bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Request rate limiting by the storage service.
    #[error("Throttled by storage service: {message}")]
    Throttled { message: String },

    /// Network-level failure (connect, DNS, dropped connection).
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Storage service returned an error response.
    #[error("Storage service error: {message}")]
    ServiceError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error: {message}")]
    IoError { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    ///
    /// Throttling and retryable network/service errors are transient;
    /// everything else (missing objects, denied access, bad requests)
    /// is permanent and must not consume a retry budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Throttled { .. } => true,
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::ServiceError { retryable, .. } => *retryable,
            StorageError::NotFound { .. } => false,
            StorageError::AccessDenied { .. } => false,
            StorageError::IoError { .. } => false,
            StorageError::InvalidConfig { .. } => false,
            StorageError::Other { .. } => false,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_is_retryable() {
        let err = StorageError::Throttled {
            message: "slow down".to_string(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn test_network_error_respects_flag() {
        let transient = StorageError::NetworkError {
            message: "connection reset".to_string(),
            retryable: true,
        };
        let fatal = StorageError::NetworkError {
            message: "tls handshake rejected".to_string(),
            retryable: false,
        };
        assert!(transient.is_retryable());
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_permanent_classes_not_retryable() {
        let not_found = StorageError::NotFound {
            bucket: "b".to_string(),
            key: "k".to_string(),
        };
        let denied = StorageError::AccessDenied {
            bucket: "b".to_string(),
            key: "k".to_string(),
            message: "no credentials".to_string(),
        };
        assert!(!not_found.is_retryable());
        assert!(!denied.is_retryable());
    }
}
