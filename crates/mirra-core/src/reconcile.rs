//! Diffing an upstream document against local state.
//!
//! Everything here is synchronous and side-effect free; [`crate::apply`]
//! turns a [`ReconcilePlan`] into store writes.

use std::collections::BTreeMap;

use mirra_registry::{AbbreviatedVersion, DistTags, PackageDocument, VersionRecord};
use serde_json::Value;

use crate::{normalize::normalize_version, projection::abbreviate};

/// Top-level manifest keys that change between fetches without the version
/// itself changing.
const VOLATILE_FIELDS: &[&str] = &[
    "_rev",
    "_attachments",
    "_cnpm_publish_time",
    "_cnpmcore_publish_time",
    "_npmOperationalInternal",
];

/// `dist` keys that depend on where the record is served from.
const VOLATILE_DIST_FIELDS: &[&str] = &["tarball", "key", "noattachment"];

/// Local rows of one package, as read from the store.
#[derive(Debug, Clone, Default)]
pub struct LocalState {
    pub versions: Vec<VersionRecord>,
    pub abbreviated: Vec<AbbreviatedVersion>,
    pub tags: DistTags,
    pub unpublished: bool,
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Host written into `dist.tarball` of mirrored versions.
    pub registry_host: String,
    /// Whether abbreviated rows are maintained.
    pub abbreviated: bool,
}

/// A transition of one version's deprecation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeprecationChange {
    pub version: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DeprecationChange {
    pub fn is_undeprecate(&self) -> bool {
        self.from.is_some() && self.to.is_none()
    }
}

/// The difference between upstream and local state of one package.
#[derive(Debug, Clone, Default)]
pub struct ReconcilePlan {
    pub name: String,
    /// Versions to write, new or semantically different, oldest first.
    pub changed_versions: Vec<String>,
    /// Subset of `changed_versions` absent locally.
    pub new_versions: Vec<String>,
    pub deprecation_changes: Vec<DeprecationChange>,
    /// Versions whose abbreviated row is missing or stale.
    pub abbreviated_dirty: Vec<String>,
    /// Local versions gone upstream.
    pub removed_versions: Vec<String>,
    /// Tags to create or move.
    pub tag_updates: DistTags,
    pub tag_removals: Vec<String>,
    /// Upstream tarball URLs of `new_versions`, before normalization.
    pub tarball_sources: BTreeMap<String, String>,
    /// Normalized records of every upstream version.
    pub records: BTreeMap<String, VersionRecord>,
    /// A local unpublish record is superseded by upstream versions.
    pub clear_unpublished: bool,
}

impl ReconcilePlan {
    pub fn is_noop(&self) -> bool {
        self.changed_versions.is_empty()
            && self.abbreviated_dirty.is_empty()
            && self.removed_versions.is_empty()
            && self.tag_updates.is_empty()
            && self.tag_removals.is_empty()
            && !self.clear_unpublished
    }

    /// Versions whose abbreviated row is repaired without the full record
    /// changing.
    pub fn abbreviated_repairs(&self) -> usize {
        self.abbreviated_dirty
            .iter()
            .filter(|version| !self.changed_versions.contains(version))
            .count()
    }

    /// Normalized record of the version `latest` points at upstream.
    pub fn latest_record(&self, upstream: &PackageDocument) -> Option<&VersionRecord> {
        upstream
            .latest_record()
            .and_then(|record| self.records.get(&record.version))
    }
}

/// Canonical value of a record for change detection.
fn semantic_value(record: &VersionRecord) -> Value {
    let mut value = serde_json::to_value(record).unwrap_or(Value::Null);
    if let Some(object) = value.as_object_mut() {
        for field in VOLATILE_FIELDS {
            object.remove(*field);
        }
        if let Some(dist) = object.get_mut("dist").and_then(Value::as_object_mut) {
            for field in VOLATILE_DIST_FIELDS {
                dist.remove(*field);
            }
        }
    }
    value
}

fn same_version(local: &VersionRecord, upstream: &VersionRecord) -> bool {
    semantic_value(local) == semantic_value(upstream)
}

/// Computes what must change locally for `name` to match `upstream`.
pub fn reconcile(
    local: &LocalState,
    upstream: &PackageDocument,
    options: &ReconcileOptions,
) -> ReconcilePlan {
    let mut plan = ReconcilePlan {
        name: upstream.name.clone(),
        ..Default::default()
    };

    let local_versions: BTreeMap<&str, &VersionRecord> = local
        .versions
        .iter()
        .map(|record| (record.version.as_str(), record))
        .collect();
    let local_abbreviated: BTreeMap<&str, &AbbreviatedVersion> = local
        .abbreviated
        .iter()
        .map(|row| (row.version.as_str(), row))
        .collect();

    for version in upstream.sorted_versions() {
        let source = &upstream.versions[version];
        let record = normalize_version(upstream, source, &options.registry_host);

        match local_versions.get(version) {
            None => {
                plan.changed_versions.push(version.to_string());
                plan.new_versions.push(version.to_string());
                if let Some(url) = source.dist.as_ref().and_then(|d| d.tarball.clone()) {
                    plan.tarball_sources.insert(version.to_string(), url);
                }
            }
            Some(existing) => {
                if existing.deprecated != record.deprecated {
                    plan.deprecation_changes.push(DeprecationChange {
                        version: version.to_string(),
                        from: existing.deprecated.clone(),
                        to: record.deprecated.clone(),
                    });
                }
                if !same_version(existing, &record) {
                    plan.changed_versions.push(version.to_string());
                }
            }
        }

        if options.abbreviated
            && local_abbreviated
                .get(version)
                .is_none_or(|row| **row != abbreviate(&record))
        {
            plan.abbreviated_dirty.push(version.to_string());
        }

        plan.records.insert(version.to_string(), record);
    }

    if !upstream.versions.is_empty() {
        plan.removed_versions = local_versions
            .keys()
            .filter(|version| !upstream.versions.contains_key(**version))
            .map(|version| version.to_string())
            .collect();
        plan.clear_unpublished = local.unpublished;
    }

    for (tag, version) in &upstream.dist_tags {
        if !upstream.versions.contains_key(version) {
            continue;
        }
        if local.tags.get(tag) != Some(version) {
            plan.tag_updates.insert(tag.clone(), version.clone());
        }
    }
    if !upstream.versions.is_empty() {
        plan.tag_removals = local
            .tags
            .keys()
            .filter(|tag| !upstream.dist_tags.contains_key(*tag))
            .cloned()
            .collect();
    }

    plan
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn options(abbreviated: bool) -> ReconcileOptions {
        ReconcileOptions {
            registry_host: "http://localhost:7001".into(),
            abbreviated,
        }
    }

    fn document(versions: Value, tags: Value) -> PackageDocument {
        serde_json::from_value(json!({
            "name": "pedding",
            "dist-tags": tags,
            "versions": versions,
        }))
        .unwrap()
    }

    /// Local state as it would look after applying `plan` to an empty store.
    fn applied(plan: &ReconcilePlan) -> LocalState {
        LocalState {
            versions: plan.records.values().cloned().collect(),
            abbreviated: plan.records.values().map(abbreviate).collect(),
            tags: plan.tag_updates.clone(),
            unpublished: false,
        }
    }

    #[test]
    fn test_first_sync_marks_everything_new() {
        let upstream = document(
            json!({
                "1.0.0": { "name": "pedding", "version": "1.0.0",
                           "dist": { "tarball": "https://registry.npmjs.org/pedding/-/pedding-1.0.0.tgz" } },
                "0.0.1": { "name": "pedding", "version": "0.0.1" }
            }),
            json!({ "latest": "1.0.0" }),
        );

        let plan = reconcile(&LocalState::default(), &upstream, &options(true));
        assert_eq!(plan.changed_versions, vec!["0.0.1", "1.0.0"]);
        assert_eq!(plan.new_versions, plan.changed_versions);
        assert_eq!(plan.abbreviated_dirty.len(), 2);
        assert_eq!(plan.tag_updates.get("latest").map(String::as_str), Some("1.0.0"));
        assert_eq!(
            plan.tarball_sources.get("1.0.0").map(String::as_str),
            Some("https://registry.npmjs.org/pedding/-/pedding-1.0.0.tgz")
        );
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_second_sync_is_noop() {
        let upstream = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0", "os": ["linux"] } }),
            json!({ "latest": "1.0.0" }),
        );

        let first = reconcile(&LocalState::default(), &upstream, &options(true));
        let second = reconcile(&applied(&first), &upstream, &options(true));
        assert!(second.changed_versions.is_empty());
        assert!(second.is_noop());
    }

    #[test]
    fn test_volatile_fields_are_ignored() {
        let upstream = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0", "_rev": "1" } }),
            json!({}),
        );
        let first = reconcile(&LocalState::default(), &upstream, &options(false));

        let moved = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0", "_rev": "2" } }),
            json!({}),
        );
        let mut local = applied(&first);
        local.versions[0].dist.as_mut().unwrap().tarball = Some("http://old-host/x.tgz".into());
        assert!(reconcile(&local, &moved, &options(false)).is_noop());
    }

    #[test]
    fn test_os_cpu_change_without_dist_change() {
        let before = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0",
                               "os": ["linux"], "cpu": ["x64"],
                               "dist": { "shasum": "abc" } } }),
            json!({ "latest": "1.0.0" }),
        );
        let after = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0",
                               "dist": { "shasum": "abc" } } }),
            json!({ "latest": "1.0.0" }),
        );

        let local = applied(&reconcile(&LocalState::default(), &before, &options(true)));
        let plan = reconcile(&local, &after, &options(true));
        assert_eq!(plan.changed_versions, vec!["1.0.0"]);
        assert_eq!(plan.abbreviated_dirty, vec!["1.0.0"]);
        assert!(plan.records["1.0.0"].os.is_none());
    }

    #[test]
    fn test_undeprecate_is_a_change() {
        let deprecated = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0", "deprecated": "use 2.x" } }),
            json!({}),
        );
        let cleared = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0" } }),
            json!({}),
        );

        let local = applied(&reconcile(&LocalState::default(), &deprecated, &options(false)));
        let plan = reconcile(&local, &cleared, &options(false));

        assert_eq!(plan.changed_versions, vec!["1.0.0"]);
        assert_eq!(plan.deprecation_changes.len(), 1);
        assert!(plan.deprecation_changes[0].is_undeprecate());
        assert_eq!(plan.records["1.0.0"].deprecated, None);
    }

    #[test]
    fn test_missing_abbreviated_row_is_repaired() {
        let upstream = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0", "deprecated": "old" } }),
            json!({}),
        );
        let mut local = applied(&reconcile(&LocalState::default(), &upstream, &options(true)));
        local.abbreviated.clear();

        let plan = reconcile(&local, &upstream, &options(true));
        assert!(plan.changed_versions.is_empty());
        assert_eq!(plan.abbreviated_dirty, vec!["1.0.0"]);
        assert_eq!(plan.abbreviated_repairs(), 1);

        assert!(reconcile(&local, &upstream, &options(false)).is_noop());
    }

    #[test]
    fn test_removed_versions_and_tags() {
        let upstream = document(
            json!({ "1.0.0": { "name": "pedding", "version": "1.0.0" } }),
            json!({ "latest": "1.0.0", "next": "9.9.9" }),
        );
        let local = LocalState {
            versions: vec![
                VersionRecord::new("pedding", "1.0.0"),
                VersionRecord::new("pedding", "0.0.1"),
            ],
            tags: DistTags::from([
                ("latest".to_string(), "0.0.1".to_string()),
                ("beta".to_string(), "0.0.1".to_string()),
            ]),
            ..Default::default()
        };

        let plan = reconcile(&local, &upstream, &options(false));
        assert_eq!(plan.removed_versions, vec!["0.0.1"]);
        assert_eq!(plan.tag_updates.len(), 1);
        assert_eq!(plan.tag_updates["latest"], "1.0.0");
        assert_eq!(plan.tag_removals, vec!["beta"]);
    }

    #[test]
    fn test_empty_upstream_removes_nothing() {
        let upstream = document(json!({}), json!({}));
        let local = LocalState {
            versions: vec![VersionRecord::new("pedding", "1.0.0")],
            tags: DistTags::from([
                ("latest".to_string(), "1.0.0".to_string()),
                ("beta".to_string(), "1.0.0".to_string()),
            ]),
            unpublished: true,
            ..Default::default()
        };

        let plan = reconcile(&local, &upstream, &options(false));
        assert!(plan.removed_versions.is_empty());
        assert!(plan.tag_removals.is_empty());
        assert!(plan.tag_updates.is_empty());
        assert!(!plan.clear_unpublished);
        assert!(plan.is_noop());
    }
}
