mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::AsyncRead;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
}

/// Readable handle to a stored object.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Abstraction over object storage backends.
/// Keys are sanitized filenames; the registry maps each key to exactly one record.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous object. Readers never
    /// observe a partially written object.
    async fn put(&self, key: &str, data: Bytes) -> Result<u64, ObjectStoreError>;
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;
    /// Open an object for streaming, returning the reader and its length.
    async fn open(&self, key: &str) -> Result<(ObjectReader, u64), ObjectStoreError>;
    /// Remove an object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}
