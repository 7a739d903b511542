//! Writing a reconcile plan to the local store.

use mirra_backup::BlobStore;
use mirra_registry::{UnpublishRecord, Upstream};
use mirra_store::PackageStore;
use tracing::{debug, info, warn};

use crate::{
    error::{Result, SyncError},
    projection::abbreviate,
    reconcile::ReconcilePlan,
};

/// Where tarballs of new versions are copied from and to.
#[derive(Clone, Copy)]
pub struct TarballMirror<'a> {
    pub upstream: &'a dyn Upstream,
    pub blobs: &'a dyn BlobStore,
}

/// What [`apply`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Versions whose full record was written.
    pub changed: Vec<String>,
    /// Abbreviated rows written.
    pub abbreviated: usize,
    pub removed: Vec<String>,
    pub tags_updated: usize,
    pub tags_removed: usize,
    pub tarballs: usize,
}

impl ApplyReport {
    pub fn changed_count(&self) -> usize {
        self.changed.len()
    }
}

async fn mirror_tarballs(
    plan: &ReconcilePlan,
    mirror: TarballMirror<'_>,
) -> Result<usize> {
    let mut mirrored = 0;
    for (version, url) in &plan.tarball_sources {
        let Some(key) = plan
            .records
            .get(version)
            .and_then(|record| record.dist.as_ref())
            .and_then(|dist| dist.key.as_deref())
        else {
            continue;
        };
        if mirror.blobs.contains(key).await? {
            continue;
        }

        let tarball_error = |reason: String| {
            SyncError::Tarball {
                name: plan.name.clone(),
                version: version.clone(),
                reason,
            }
        };
        let bytes = mirror
            .upstream
            .fetch_tarball(url)
            .await
            .map_err(|err| tarball_error(err.to_string()))?;
        let size = bytes.len();
        mirror
            .blobs
            .put(key, bytes)
            .await
            .map_err(|err| tarball_error(err.to_string()))?;

        debug!(name = plan.name, version, key, size, "tarball mirrored");
        mirrored += 1;
    }
    Ok(mirrored)
}

/// Applies `plan` to `store`.
///
/// Tarballs are mirrored first so that no version record is written whose
/// tarball is missing. Version records are replaced wholesale, which is what
/// clears a `deprecated` message or an `os` list dropped upstream.
pub async fn apply(
    plan: &ReconcilePlan,
    store: &dyn PackageStore,
    tarballs: Option<TarballMirror<'_>>,
) -> Result<ApplyReport> {
    let mut report = ApplyReport::default();

    if let Some(mirror) = tarballs {
        report.tarballs = mirror_tarballs(plan, mirror).await?;
    }

    for change in &plan.deprecation_changes {
        if change.is_undeprecate() {
            info!(name = plan.name, version = change.version, "version undeprecated");
        } else {
            info!(
                name = plan.name,
                version = change.version,
                message = change.to.as_deref().unwrap_or_default(),
                "version deprecated"
            );
        }
    }

    for version in &plan.changed_versions {
        let Some(record) = plan.records.get(version) else {
            warn!(name = plan.name, version, "changed version has no record");
            continue;
        };
        store.save_version(record.clone()).await?;
        report.changed.push(version.clone());
    }

    for version in &plan.abbreviated_dirty {
        if let Some(record) = plan.records.get(version) {
            store.save_abbreviated(abbreviate(record)).await?;
            report.abbreviated += 1;
        }
    }

    if !plan.removed_versions.is_empty() {
        store
            .remove_versions(&plan.name, &plan.removed_versions)
            .await?;
        info!(
            name = plan.name,
            versions = ?plan.removed_versions,
            "removed versions gone upstream"
        );
        report.removed = plan.removed_versions.clone();
    }

    for (tag, version) in &plan.tag_updates {
        store.set_tag(&plan.name, tag, version).await?;
        report.tags_updated += 1;
    }
    for tag in &plan.tag_removals {
        store.remove_tag(&plan.name, tag).await?;
        report.tags_removed += 1;
    }

    if plan.clear_unpublished {
        store.clear_unpublished(&plan.name).await?;
    }

    debug!(
        name = plan.name,
        changed = report.changed.len(),
        abbreviated = report.abbreviated,
        removed = report.removed.len(),
        "plan applied"
    );
    Ok(report)
}

/// Mirrors a full unpublish: drops every local version and tag and keeps the
/// unpublish record. Returns the number of versions removed.
pub async fn apply_unpublish(store: &dyn PackageStore, record: &UnpublishRecord) -> Result<usize> {
    let removed = store.list_versions(&record.name).await?.len();
    store.remove_package(&record.name).await?;
    store.save_unpublished(record.clone()).await?;

    info!(name = record.name, removed, "package unpublished upstream");
    Ok(removed)
}
