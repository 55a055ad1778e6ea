use thiserror::Error;
use uuid::Uuid;

use crate::dao::storage::StorageError;

/// Result alias for the MongoDB backend.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Failures specific to the MongoDB room store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("invalid MongoDB connection string `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("missing environment variable {var}")]
    MissingEnvVar { var: &'static str },
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("{operation} failed on collection `{collection}`")]
    Operation {
        operation: &'static str,
        collection: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("{operation} failed for room `{id}`")]
    Room {
        operation: &'static str,
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
}

impl MongoDaoError {
    /// Shorthand for per-collection operation failures.
    pub fn op(
        operation: &'static str,
        collection: &'static str,
        source: mongodb::error::Error,
    ) -> Self {
        MongoDaoError::Operation {
            operation,
            collection,
            source,
        }
    }
}

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}
