//! Package document and version record structures.
//!
//! These mirror the registry JSON format closely. Fields the engine reasons
//! about are typed; everything else is carried through `extra` so that a
//! document survives a round trip through the mirror unchanged.

use std::{cmp::Ordering, collections::BTreeMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Mapping of dist-tag to version.
pub type DistTags = BTreeMap<String, String>;

/// Dependency name to range.
pub type DependencyMap = BTreeMap<String, String>;

/// Internal enum for deserializing boolean values that may be strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlexiBool {
    Bool(bool),
    String(String),
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<FlexiBool>::deserialize(deserializer)? {
        Some(FlexiBool::Bool(b)) => Some(b),
        Some(FlexiBool::String(s)) => {
            match s.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" => Some(false),
                _ => None,
            }
        }
        None => None,
    })
}

/// Deprecation messages: `""` and `false` both mean "not deprecated".
#[derive(Deserialize)]
#[serde(untagged)]
enum DeprecatedValue {
    Message(String),
    Flag(bool),
}

fn deprecated_message<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<DeprecatedValue>::deserialize(deserializer)? {
        Some(DeprecatedValue::Message(s)) => Some(s).filter(|s| !s.is_empty()),
        Some(DeprecatedValue::Flag(true)) => Some("deprecated".to_string()),
        Some(DeprecatedValue::Flag(false)) | None => None,
    })
}

/// Dependency maps from old publishes: arrays of names, non-string ranges,
/// or values that are not maps at all.
fn dependency_map<'de, D>(deserializer: D) -> Result<Option<DependencyMap>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Object(entries)) => {
            Some(
                entries
                    .into_iter()
                    .filter_map(|(name, range)| {
                        let range = match range {
                            Value::String(range) => range,
                            Value::Null => "*".to_string(),
                            Value::Bool(_) | Value::Number(_) => range.to_string(),
                            Value::Array(_) | Value::Object(_) => return None,
                        };
                        Some((name, range))
                    })
                    .collect(),
            )
        }
        Some(Value::Array(names)) => {
            let map: DependencyMap = names
                .into_iter()
                .filter_map(|name| {
                    match name {
                        Value::String(name) if !name.is_empty() => Some((name, "*".to_string())),
                        _ => None,
                    }
                })
                .collect();
            Some(map).filter(|map| !map.is_empty())
        }
        _ => None,
    })
}

/// Publish timestamps arrive as epoch milliseconds or as RFC 3339 strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Timestamp {
    Millis(i64),
    Text(String),
}

fn publish_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Timestamp>::deserialize(deserializer)? {
        Some(Timestamp::Millis(ms)) => Some(ms),
        Some(Timestamp::Text(s)) => {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.timestamp_millis())
        }
        None => None,
    })
}

/// Artifact metadata of one version.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Dist {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tarball: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shasum: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(
        default,
        rename = "fileCount",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_count: Option<u64>,

    #[serde(
        default,
        rename = "unpackedSize",
        skip_serializing_if = "Option::is_none"
    )]
    pub unpacked_size: Option<u64>,

    /// Blob-store key of the mirrored tarball.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noattachment: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Manifest of a single published version.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VersionRecord {
    pub name: String,

    pub version: String,

    /// Epoch milliseconds.
    #[serde(
        default,
        deserialize_with = "publish_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub publish_time: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dist: Option<Dist>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Vec<String>>,

    #[serde(
        default,
        rename = "peerDependenciesMeta",
        skip_serializing_if = "Option::is_none"
    )]
    pub peer_dependencies_meta: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scripts: Option<Map<String, Value>>,

    #[serde(
        default,
        rename = "hasInstallScript",
        deserialize_with = "flexible_bool",
        skip_serializing_if = "Option::is_none"
    )]
    pub has_install_script: Option<bool>,

    #[serde(
        default,
        deserialize_with = "deprecated_message",
        skip_serializing_if = "Option::is_none"
    )]
    pub deprecated: Option<String>,

    #[serde(
        default,
        deserialize_with = "dependency_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub dependencies: Option<DependencyMap>,

    #[serde(
        default,
        rename = "optionalDependencies",
        deserialize_with = "dependency_map",
        skip_serializing_if = "Option::is_none"
    )]
    pub optional_dependencies: Option<DependencyMap>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl VersionRecord {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Default::default()
        }
    }

    /// Names this version depends on at install time, deduplicated.
    pub fn dependency_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .dependencies
            .iter()
            .chain(self.optional_dependencies.iter())
            .flat_map(|deps| deps.keys().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Whether any lifecycle script runs on install.
    pub fn declares_install_script(&self) -> bool {
        self.scripts.as_ref().is_some_and(|scripts| {
            ["preinstall", "install", "postinstall"]
                .iter()
                .any(|hook| scripts.contains_key(*hook))
        })
    }

    /// Looks up a manifest field that is not modelled explicitly.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// Record describing a full unpublish of a package.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UnpublishRecord {
    #[serde(default)]
    pub name: String,

    pub time: DateTime<Utc>,

    #[serde(default)]
    pub tags: DistTags,

    #[serde(default)]
    pub maintainers: Vec<Value>,

    #[serde(default)]
    pub versions: Vec<String>,
}

/// The `time` object of a package document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PackageTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unpublished: Option<UnpublishRecord>,

    /// Publish time of each version.
    #[serde(flatten)]
    pub versions: BTreeMap<String, DateTime<Utc>>,
}

/// A full package document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PackageDocument {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainers: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme: Option<String>,

    #[serde(
        default,
        rename = "readmeFilename",
        skip_serializing_if = "Option::is_none"
    )]
    pub readme_filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bugs: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<Value>,

    #[serde(default, rename = "dist-tags")]
    pub dist_tags: DistTags,

    #[serde(default)]
    pub time: PackageTime,

    #[serde(default)]
    pub versions: BTreeMap<String, VersionRecord>,
}

fn string_field(record: &VersionRecord, key: &str) -> Option<String> {
    record
        .field(key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

impl PackageDocument {
    /// Publish time of `version` in epoch milliseconds.
    ///
    /// The version record's own `publish_time` wins over the `time` map.
    pub fn publish_time(&self, version: &str) -> Option<i64> {
        self.versions
            .get(version)
            .and_then(|record| record.publish_time)
            .or_else(|| {
                self.time
                    .versions
                    .get(version)
                    .map(DateTime::timestamp_millis)
            })
    }

    /// The version record root fields are derived from: the `latest` tag if
    /// it resolves, otherwise the most recently published version.
    pub fn latest_record(&self) -> Option<&VersionRecord> {
        if let Some(record) = self
            .dist_tags
            .get("latest")
            .and_then(|version| self.versions.get(version))
        {
            return Some(record);
        }

        self.versions.values().max_by(|a, b| {
            self.publish_time(&a.version)
                .cmp(&self.publish_time(&b.version))
                .then_with(|| compare_versions(&a.version, &b.version))
        })
    }

    /// Copies root scalar fields from `record`.
    pub fn set_root_fields(&mut self, record: &VersionRecord) {
        self.description = string_field(record, "description");
        self.maintainers = record.field("maintainers").cloned();
        self.author = record.field("author").cloned();
        self.repository = record.field("repository").cloned();
        self.readme = string_field(record, "readme");
        self.readme_filename = string_field(record, "readmeFilename");
        self.homepage = string_field(record, "homepage");
        self.bugs = record.field("bugs").cloned();
        self.license = record.field("license").cloned();
    }

    /// Rebuilds `time` from the versions' publish times.
    pub fn refresh_time(&mut self) {
        let stamps: BTreeMap<String, DateTime<Utc>> = self
            .versions
            .keys()
            .filter_map(|version| {
                self.publish_time(version)
                    .and_then(DateTime::from_timestamp_millis)
                    .map(|dt| (version.clone(), dt))
            })
            .collect();

        self.time.created = stamps.values().min().copied();
        self.time.modified = stamps.values().max().copied();
        self.time.versions = stamps;
    }

    /// The unpublish record if this document describes an unpublished
    /// package, with its name filled in.
    pub fn unpublished(&self) -> Option<UnpublishRecord> {
        let mut record = self.time.unpublished.clone()?;
        if record.name.is_empty() {
            record.name = self.name.clone();
        }
        Some(record)
    }

    /// Versions sorted by semver precedence, oldest first.
    pub fn sorted_versions(&self) -> Vec<&str> {
        let mut versions: Vec<&str> = self.versions.keys().map(String::as_str).collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_version_record_flexible_fields() {
        let record: VersionRecord = serde_json::from_value(json!({
            "name": "a",
            "version": "1.0.0",
            "deprecated": "",
            "hasInstallScript": "true",
            "publish_time": 1_500_000_000_000_i64,
            "description": "kept"
        }))
        .unwrap();

        assert_eq!(record.deprecated, None);
        assert_eq!(record.has_install_script, Some(true));
        assert_eq!(record.publish_time, Some(1_500_000_000_000));
        assert_eq!(record.field("description"), Some(&json!("kept")));

        let record: VersionRecord = serde_json::from_value(json!({
            "name": "a",
            "version": "1.0.0",
            "deprecated": false,
            "publish_time": "2017-02-21T13:10:22.892Z"
        }))
        .unwrap();
        assert_eq!(record.deprecated, None);
        assert_eq!(record.publish_time, Some(1_487_682_622_892));
    }

    #[test]
    fn test_legacy_dependency_shapes() {
        let doc: PackageDocument = serde_json::from_value(json!({
            "name": "legacy",
            "dist-tags": { "latest": "1.0.0" },
            "versions": {
                "0.0.1": { "name": "legacy", "version": "0.0.1", "dependencies": [] },
                "0.0.2": {
                    "name": "legacy",
                    "version": "0.0.2",
                    "dependencies": ["ms", ""],
                    "optionalDependencies": "none"
                },
                "0.0.3": {
                    "name": "legacy",
                    "version": "0.0.3",
                    "dependencies": { "ms": 1, "debug": null, "odd": { "v": "1" } }
                },
                "1.0.0": {
                    "name": "legacy",
                    "version": "1.0.0",
                    "dependencies": { "ms": "^2.0.0" }
                }
            }
        }))
        .unwrap();

        assert_eq!(doc.versions.len(), 4);
        assert_eq!(doc.versions["0.0.1"].dependencies, None);
        assert_eq!(doc.versions["0.0.2"].dependency_names(), vec!["ms"]);
        assert_eq!(doc.versions["0.0.2"].optional_dependencies, None);
        assert_eq!(
            doc.versions["0.0.3"].dependencies,
            Some(DependencyMap::from([
                ("debug".to_string(), "*".to_string()),
                ("ms".to_string(), "1".to_string()),
            ]))
        );
        assert_eq!(doc.versions["1.0.0"].dependency_names(), vec!["ms"]);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let value = json!({
            "name": "a",
            "version": "1.0.0",
            "dist": { "shasum": "abc", "signatures": [{ "sig": "x" }] },
            "engines": { "node": ">=8" }
        });
        let record: VersionRecord = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(serde_json::to_value(&record).unwrap(), value);
    }

    #[test]
    fn test_dependency_names() {
        let mut record = VersionRecord::new("a", "1.0.0");
        record.dependencies = Some(DependencyMap::from([
            ("ms".into(), "^2".into()),
            ("debug".into(), "^4".into()),
        ]));
        record.optional_dependencies = Some(DependencyMap::from([
            ("ms".into(), "^2".into()),
            ("fsevents".into(), "*".into()),
        ]));

        assert_eq!(record.dependency_names(), vec!["debug", "fsevents", "ms"]);
    }

    #[test]
    fn test_declares_install_script() {
        let mut record = VersionRecord::new("a", "1.0.0");
        assert!(!record.declares_install_script());

        record.scripts = Some(
            json!({ "test": "mocha" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(!record.declares_install_script());

        record.scripts = Some(
            json!({ "postinstall": "node build.js" })
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert!(record.declares_install_script());
    }

    #[test]
    fn test_latest_record_falls_back_to_newest_publish() {
        let mut doc = PackageDocument {
            name: "a".into(),
            ..Default::default()
        };
        for (version, time) in [("1.0.0", 10), ("1.0.1", 30), ("0.9.0", 20)] {
            let mut record = VersionRecord::new("a", version);
            record.publish_time = Some(time);
            doc.versions.insert(version.into(), record);
        }

        assert_eq!(doc.latest_record().unwrap().version, "1.0.1");

        doc.dist_tags.insert("latest".into(), "0.9.0".into());
        assert_eq!(doc.latest_record().unwrap().version, "0.9.0");

        doc.dist_tags.insert("latest".into(), "9.9.9".into());
        assert_eq!(doc.latest_record().unwrap().version, "1.0.1");
    }

    #[test]
    fn test_refresh_time() {
        let mut doc = PackageDocument {
            name: "a".into(),
            ..Default::default()
        };
        for (version, time) in [("1.0.0", 1_000), ("1.0.1", 5_000)] {
            let mut record = VersionRecord::new("a", version);
            record.publish_time = Some(time);
            doc.versions.insert(version.into(), record);
        }
        doc.refresh_time();

        assert_eq!(doc.time.created.unwrap().timestamp_millis(), 1_000);
        assert_eq!(doc.time.modified.unwrap().timestamp_millis(), 5_000);
        assert_eq!(doc.time.versions.len(), 2);
    }

    #[test]
    fn test_unpublished_document() {
        let doc: PackageDocument = serde_json::from_value(json!({
            "name": "afp",
            "time": {
                "created": "2017-01-01T00:00:00.000Z",
                "unpublished": {
                    "time": "2017-02-21T13:10:22.892Z",
                    "tags": { "latest": "0.0.1" },
                    "maintainers": [{ "name": "xinglie" }],
                    "versions": ["0.0.1"]
                }
            }
        }))
        .unwrap();

        let record = doc.unpublished().unwrap();
        assert_eq!(record.name, "afp");
        assert_eq!(record.versions, vec!["0.0.1"]);
        assert!(doc.versions.is_empty());
    }

    #[test]
    fn test_time_map_publish_time() {
        let doc: PackageDocument = serde_json::from_value(json!({
            "name": "a",
            "time": { "1.0.0": "2020-01-01T00:00:00.000Z" },
            "versions": { "1.0.0": { "name": "a", "version": "1.0.0" } }
        }))
        .unwrap();

        assert_eq!(doc.publish_time("1.0.0"), Some(1_577_836_800_000));
        assert_eq!(doc.sorted_versions(), vec!["1.0.0"]);
    }

    #[test]
    fn test_sorted_versions_semver_order() {
        let mut doc = PackageDocument::default();
        for version in ["1.10.0", "1.2.0", "1.2.0-beta.1"] {
            doc.versions
                .insert(version.into(), VersionRecord::new("a", version));
        }
        assert_eq!(doc.sorted_versions(), vec!["1.2.0-beta.1", "1.2.0", "1.10.0"]);
    }
}
