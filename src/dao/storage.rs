use std::error::Error;
use thiserror::Error;

/// Result alias for room-store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Backend-agnostic failure raised by room-store implementations.
///
/// Whatever the driver reports collapses into `Unavailable`: the service
/// layer treats every storage failure the same way, and the supervisor owns
/// deciding whether to reconnect.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backing database did not complete the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Operation context for logs and alerts; never sent to clients.
        message: String,
        /// Driver-level cause.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Wrap a backend failure with its operation context.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
