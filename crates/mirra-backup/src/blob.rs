//! Key-addressed blob storage.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// An opaque key/value byte store.
///
/// Keys are `/`-separated. `get` and `remove` report an absent key as
/// [`BackupError::KeyMissing`](crate::BackupError::KeyMissing); callers
/// decide whether that matters.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Creates or overwrites the blob at `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    async fn contains(&self, key: &str) -> Result<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(crate::BackupError::KeyMissing(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }
}

pub type BlobStoreHandle = Arc<dyn BlobStore>;
