//! Persisting local package state into the blob store.

use std::collections::BTreeSet;

use mirra_registry::UnpublishRecord;
use mirra_store::PackageStore;
use tracing::{debug, trace};

use crate::{
    blob::BlobStore,
    error::{ignore_missing, BackupError, Result},
    keys,
};

/// What one save pass changed in the blob store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackupSummary {
    pub written: usize,
    pub removed: usize,
}

async fn read_existing(blobs: &dyn BlobStore, key: &str) -> Result<Option<Vec<u8>>> {
    match blobs.get(key).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(BackupError::KeyMissing(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

/// Writes `bytes` at `key` unless the blob already holds exactly them.
async fn put_if_changed(blobs: &dyn BlobStore, key: &str, bytes: Vec<u8>) -> Result<bool> {
    if read_existing(blobs, key).await?.as_deref() == Some(bytes.as_slice()) {
        return Ok(false);
    }
    blobs.put(key, bytes).await?;
    Ok(true)
}

/// Brings the backup records of `name` in line with the local store.
///
/// One blob per version and one per dist-tag, each written only when its
/// content changed. Records of versions and tags that no longer exist locally
/// are deleted; a record that is already gone is not an error. When versions
/// exist, a stale unpublish record is cleared.
pub async fn save_backup_files(
    store: &dyn PackageStore,
    blobs: &dyn BlobStore,
    name: &str,
) -> Result<BackupSummary> {
    let mut summary = BackupSummary::default();
    let versions = store.list_versions(name).await?;
    let tags = store.list_tags(name).await?;

    let mut local_versions = BTreeSet::new();
    for record in &versions {
        local_versions.insert(record.version.clone());
        let key = keys::package_file_key(name, &record.version);
        if put_if_changed(blobs, &key, serde_json::to_vec(record)?).await? {
            trace!(key, "package file written");
            summary.written += 1;
        }
    }

    for key in blobs.list(&keys::package_files_prefix(name)).await? {
        let stale = keys::version_from_key(name, &key)
            .is_some_and(|version| !local_versions.contains(&version));
        if stale && ignore_missing(blobs.remove(&key).await)? {
            summary.removed += 1;
        }
    }

    for (tag, version) in &tags {
        let key = keys::dist_tag_key(name, tag);
        if put_if_changed(blobs, &key, version.as_bytes().to_vec()).await? {
            trace!(key, version, "dist-tag written");
            summary.written += 1;
        }
    }

    for key in blobs.list(&keys::dist_tags_prefix(name)).await? {
        let stale = keys::tag_from_key(name, &key).is_some_and(|tag| !tags.contains_key(&tag));
        if stale && ignore_missing(blobs.remove(&key).await)? {
            trace!(key, "dist-tag removed");
            summary.removed += 1;
        }
    }

    if !versions.is_empty() && ignore_missing(blobs.remove(&keys::unpublish_key(name)).await)? {
        summary.removed += 1;
    }

    debug!(
        name,
        written = summary.written,
        removed = summary.removed,
        "backup files saved"
    );
    Ok(summary)
}

/// Writes the single unpublish record of a package.
pub async fn save_unpublish_record(blobs: &dyn BlobStore, record: &UnpublishRecord) -> Result<()> {
    let key = keys::unpublish_key(&record.name);
    blobs.put(&key, serde_json::to_vec(record)?).await?;
    debug!(name = %record.name, "unpublish record saved");
    Ok(())
}
