//! Local form of mirrored version records.

use mirra_backup::keys::tarball_key;
use mirra_registry::{Dist, PackageDocument, VersionRecord};

/// Rewrites an upstream version record into the form stored locally.
///
/// - `publish_time` is filled from the document's `time` map
/// - `dist.tarball` points at this mirror and `dist.key` at the blob
/// - `noattachment` is dropped
/// - `hasInstallScript` is derived from `scripts` when upstream omits it
pub fn normalize_version(
    doc: &PackageDocument,
    record: &VersionRecord,
    registry_host: &str,
) -> VersionRecord {
    let mut record = record.clone();
    if record.name.is_empty() {
        record.name = doc.name.clone();
    }
    if record.publish_time.is_none() {
        record.publish_time = doc.publish_time(&record.version);
    }

    let key = tarball_key(&record.name, &record.version);
    let dist = record.dist.get_or_insert_with(Dist::default);
    dist.tarball = Some(format!("{}{}", registry_host.trim_end_matches('/'), key));
    dist.key = Some(key);
    dist.noattachment = None;

    if record.has_install_script.is_none() && record.declares_install_script() {
        record.has_install_script = Some(true);
    }

    record
}
