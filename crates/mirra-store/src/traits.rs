//! Contracts of the local storage layer.

use std::sync::Arc;

use async_trait::async_trait;
use mirra_registry::{AbbreviatedVersion, DistTags, UnpublishRecord, VersionRecord};

use crate::{error::Result, model::LocalUser};

/// Per-package version, abbreviated, dist-tag and unpublish rows.
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Whether any version of `name` is stored locally.
    async fn exists(&self, name: &str) -> Result<bool>;

    async fn list_versions(&self, name: &str) -> Result<Vec<VersionRecord>>;

    /// Inserts or fully replaces the record for `(record.name, record.version)`.
    ///
    /// Replacement is total: a field absent from `record` is absent afterwards.
    async fn save_version(&self, record: VersionRecord) -> Result<()>;

    /// Removes full and abbreviated rows of `versions`.
    async fn remove_versions(&self, name: &str, versions: &[String]) -> Result<()>;

    async fn list_abbreviated(&self, name: &str) -> Result<Vec<AbbreviatedVersion>>;

    async fn save_abbreviated(&self, record: AbbreviatedVersion) -> Result<()>;

    async fn list_tags(&self, name: &str) -> Result<DistTags>;

    async fn set_tag(&self, name: &str, tag: &str, version: &str) -> Result<()>;

    async fn remove_tag(&self, name: &str, tag: &str) -> Result<()>;

    async fn get_unpublished(&self, name: &str) -> Result<Option<UnpublishRecord>>;

    async fn save_unpublished(&self, record: UnpublishRecord) -> Result<()>;

    async fn clear_unpublished(&self, name: &str) -> Result<()>;

    /// Removes every version and tag of `name`. Unpublish records survive.
    async fn remove_package(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, name: &str) -> Result<Option<LocalUser>>;

    async fn save_user(&self, user: LocalUser) -> Result<()>;

    /// Returns whether a record was deleted.
    async fn delete_user(&self, name: &str) -> Result<bool>;
}

/// Append-only progress log of sync runs, keyed by log identifier.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn append(&self, log_id: &str, line: &str) -> Result<()>;

    async fn read(&self, log_id: &str) -> Result<Vec<String>>;
}

pub type PackageStoreHandle = Arc<dyn PackageStore>;
pub type UserStoreHandle = Arc<dyn UserStore>;
pub type SyncLogStoreHandle = Arc<dyn SyncLogStore>;
