//! Rebuilding package documents from backup records alone.

use std::collections::BTreeMap;

use mirra_registry::{DistTags, PackageDocument, UnpublishRecord, VersionRecord};
use tracing::debug;

use crate::{
    blob::BlobStore,
    error::{BackupError, Result},
    keys,
};

/// What the backup store knows about a package.
#[derive(Debug, Clone, PartialEq)]
pub enum Restored {
    Document(PackageDocument),
    Unpublished(UnpublishRecord),
}

/// Reads a blob, turning an absent key into [`BackupError::NotFound`] for
/// `name`.
async fn get_required(blobs: &dyn BlobStore, name: &str, key: &str) -> Result<Vec<u8>> {
    blobs.get(key).await.map_err(|err| {
        match err {
            BackupError::KeyMissing(_) => BackupError::NotFound(name.to_string()),
            err => err,
        }
    })
}

async fn load_version(blobs: &dyn BlobStore, name: &str, key: &str) -> Result<VersionRecord> {
    let bytes = get_required(blobs, name, key).await?;
    serde_json::from_slice(&bytes).map_err(|err| {
        BackupError::Corrupted {
            key: key.to_string(),
            reason: err.to_string(),
        }
    })
}

/// Reads the version a dist-tag record points at.
pub async fn restore_tag(blobs: &dyn BlobStore, name: &str, tag: &str) -> Result<String> {
    let key = keys::dist_tag_key(name, tag);
    let bytes = get_required(blobs, name, &key).await?;
    String::from_utf8(bytes)
        .map(|version| version.trim().to_string())
        .map_err(|err| {
            BackupError::Corrupted {
                key,
                reason: err.to_string(),
            }
        })
}

/// Assembles the package document of `name` from its backup records.
///
/// Root fields come from the version `latest` points at, or from the most
/// recently published version without one. A tag whose version record is
/// missing fails the restore with [`BackupError::NotFound`]. Without any
/// package-file record, a stored unpublish record is returned instead.
pub async fn restore(blobs: &dyn BlobStore, name: &str) -> Result<Restored> {
    let mut versions = BTreeMap::new();
    for key in blobs.list(&keys::package_files_prefix(name)).await? {
        if keys::version_from_key(name, &key).is_none() {
            continue;
        }
        let record = load_version(blobs, name, &key).await?;
        versions.insert(record.version.clone(), record);
    }

    if versions.is_empty() {
        let bytes = get_required(blobs, name, &keys::unpublish_key(name)).await?;
        let mut record: UnpublishRecord = serde_json::from_slice(&bytes).map_err(|err| {
            BackupError::Corrupted {
                key: keys::unpublish_key(name),
                reason: err.to_string(),
            }
        })?;
        record.name = name.to_string();
        debug!(name, "restored unpublish record");
        return Ok(Restored::Unpublished(record));
    }

    let mut dist_tags = DistTags::new();
    for key in blobs.list(&keys::dist_tags_prefix(name)).await? {
        let Some(tag) = keys::tag_from_key(name, &key) else {
            continue;
        };
        let version = restore_tag(blobs, name, &tag).await?;
        if !versions.contains_key(&version) {
            let record =
                load_version(blobs, name, &keys::package_file_key(name, &version)).await?;
            versions.insert(version.clone(), record);
        }
        dist_tags.insert(tag, version);
    }

    let mut doc = PackageDocument {
        name: name.to_string(),
        dist_tags,
        versions,
        ..Default::default()
    };
    doc.refresh_time();
    if let Some(root) = doc.latest_record().cloned() {
        doc.set_root_fields(&root);
    }

    debug!(
        name,
        versions = doc.versions.len(),
        tags = doc.dist_tags.len(),
        "restored package document"
    );
    Ok(Restored::Document(doc))
}
