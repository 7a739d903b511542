//! Serving-side views of local package state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mirra_registry::{AbbreviatedVersion, DistTags, PackageDocument, UnpublishRecord};
use mirra_store::PackageStore;
use mirra_utils::hash::content_etag;
use serde::Serialize;

use crate::{error::Result, projection::abbreviate, reconcile::LocalState};

/// Reads the local rows of `name` for reconciliation.
pub async fn load_local(store: &dyn PackageStore, name: &str) -> Result<LocalState> {
    Ok(LocalState {
        versions: store.list_versions(name).await?,
        abbreviated: store.list_abbreviated(name).await?,
        tags: store.list_tags(name).await?,
        unpublished: store.get_unpublished(name).await?.is_some(),
    })
}

/// Local view of a package.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalDocument {
    Document(PackageDocument),
    Unpublished(UnpublishRecord),
}

/// Assembles the full package document of `name` from local rows.
///
/// Returns `None` when nothing is known locally.
pub async fn build_document(store: &dyn PackageStore, name: &str) -> Result<Option<LocalDocument>> {
    let versions = store.list_versions(name).await?;
    if versions.is_empty() {
        return Ok(store
            .get_unpublished(name)
            .await?
            .map(LocalDocument::Unpublished));
    }

    let mut doc = PackageDocument {
        name: name.to_string(),
        dist_tags: store.list_tags(name).await?,
        versions: versions
            .into_iter()
            .map(|record| (record.version.clone(), record))
            .collect(),
        ..Default::default()
    };
    doc.refresh_time();
    if let Some(root) = doc.latest_record().cloned() {
        doc.set_root_fields(&root);
    }
    Ok(Some(LocalDocument::Document(doc)))
}

/// Which payload a client asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Representation {
    #[default]
    Full,
    Abbreviated,
}

impl Representation {
    /// Picks the representation from an `Accept` header value.
    pub fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(value) if value.contains("application/vnd.npm.install-v1+json") => {
                Representation::Abbreviated
            }
            _ => Representation::Full,
        }
    }
}

#[derive(Serialize)]
struct AbbreviatedDocument<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<DateTime<Utc>>,
    #[serde(rename = "dist-tags")]
    dist_tags: &'a DistTags,
    versions: BTreeMap<String, AbbreviatedVersion>,
}

#[derive(Serialize)]
struct UnpublishedTime<'a> {
    unpublished: &'a UnpublishRecord,
}

#[derive(Serialize)]
struct UnpublishedDocument<'a> {
    name: &'a str,
    time: UnpublishedTime<'a>,
}

/// A serialized payload together with its entity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub body: Vec<u8>,
    pub etag: String,
}

impl RenderedDocument {
    fn new(body: Vec<u8>) -> Self {
        let etag = content_etag(&body);
        Self { body, etag }
    }
}

/// Renders the payload of `name` served to clients.
///
/// Abbreviated rows saved by the sync engine are used as-is; a version
/// without one is projected on the fly.
pub async fn render(
    store: &dyn PackageStore,
    name: &str,
    representation: Representation,
) -> Result<Option<RenderedDocument>> {
    let doc = match build_document(store, name).await? {
        None => return Ok(None),
        Some(LocalDocument::Unpublished(record)) => {
            let body = serde_json::to_vec(&UnpublishedDocument {
                name,
                time: UnpublishedTime {
                    unpublished: &record,
                },
            })
            .map_err(mirra_store::StoreError::from)?;
            return Ok(Some(RenderedDocument::new(body)));
        }
        Some(LocalDocument::Document(doc)) => doc,
    };

    let body = match representation {
        Representation::Full => serde_json::to_vec(&doc),
        Representation::Abbreviated => {
            let mut versions: BTreeMap<String, AbbreviatedVersion> = store
                .list_abbreviated(name)
                .await?
                .into_iter()
                .filter(|row| doc.versions.contains_key(&row.version))
                .map(|row| (row.version.clone(), row))
                .collect();
            for (version, record) in &doc.versions {
                if !versions.contains_key(version) {
                    versions.insert(version.clone(), abbreviate(record));
                }
            }

            serde_json::to_vec(&AbbreviatedDocument {
                name,
                modified: doc.time.modified,
                dist_tags: &doc.dist_tags,
                versions,
            })
        }
    }
    .map_err(mirra_store::StoreError::from)?;

    Ok(Some(RenderedDocument::new(body)))
}

#[cfg(test)]
mod tests {
    use mirra_registry::VersionRecord;
    use mirra_store::MemoryStore;
    use serde_json::{json, Value};

    use super::*;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (version, time) in [("1.0.0", 1_000_i64), ("1.0.1", 2_000)] {
            let mut record: VersionRecord = serde_json::from_value(json!({
                "name": "pedding",
                "version": version,
                "description": format!("pedding {version}"),
                "readme": "long text",
                "scripts": { "test": "mocha" },
                "os": ["linux"]
            }))
            .unwrap();
            record.publish_time = Some(time);
            store.save_version(record).await.unwrap();
        }
        store.set_tag("pedding", "latest", "1.0.0").await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_full_document_root_fields_follow_latest() {
        let store = seeded().await;
        let Some(LocalDocument::Document(doc)) = build_document(&store, "pedding").await.unwrap()
        else {
            panic!("expected a document");
        };

        assert_eq!(doc.description.as_deref(), Some("pedding 1.0.0"));
        assert_eq!(doc.time.modified.unwrap().timestamp_millis(), 2_000);
        assert_eq!(doc.time.created.unwrap().timestamp_millis(), 1_000);
    }

    #[tokio::test]
    async fn test_abbreviated_payload() {
        let store = seeded().await;
        let rendered = render(&store, "pedding", Representation::Abbreviated)
            .await
            .unwrap()
            .unwrap();
        let body: Value = serde_json::from_slice(&rendered.body).unwrap();

        assert_eq!(body["name"], "pedding");
        assert_eq!(body["dist-tags"]["latest"], "1.0.0");
        assert_eq!(body["versions"]["1.0.0"]["os"], json!(["linux"]));
        assert!(body["versions"]["1.0.0"].get("scripts").is_none());
        assert!(body["versions"]["1.0.0"].get("readme").is_none());
        assert!(body.get("modified").is_some());
    }

    #[tokio::test]
    async fn test_etag_tracks_content() {
        let store = seeded().await;
        let first = render(&store, "pedding", Representation::Abbreviated)
            .await
            .unwrap()
            .unwrap();
        let again = render(&store, "pedding", Representation::Abbreviated)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, again);

        let mut record = store.list_versions("pedding").await.unwrap().remove(0);
        record.deprecated = Some("no longer maintained".into());
        store.save_version(record).await.unwrap();

        let changed = render(&store, "pedding", Representation::Abbreviated)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first.etag, changed.etag);

        let full = render(&store, "pedding", Representation::Full)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(full.etag, changed.etag);
    }

    #[tokio::test]
    async fn test_unknown_and_unpublished() {
        let store = MemoryStore::new();
        assert!(render(&store, "afp", Representation::Full)
            .await
            .unwrap()
            .is_none());

        store
            .save_unpublished(UnpublishRecord {
                name: "afp".into(),
                time: Utc::now(),
                tags: DistTags::new(),
                maintainers: Vec::new(),
                versions: vec!["0.0.1".into()],
            })
            .await
            .unwrap();
        let rendered = render(&store, "afp", Representation::Abbreviated)
            .await
            .unwrap()
            .unwrap();
        let body: Value = serde_json::from_slice(&rendered.body).unwrap();
        assert_eq!(body["name"], "afp");
        assert_eq!(body["time"]["unpublished"]["versions"], json!(["0.0.1"]));
        assert!(body.get("versions").is_none());
    }

    #[test]
    fn test_representation_from_accept() {
        assert_eq!(
            Representation::from_accept(Some(
                "application/vnd.npm.install-v1+json; q=1.0, application/json; q=0.8"
            )),
            Representation::Abbreviated
        );
        assert_eq!(
            Representation::from_accept(Some("application/json")),
            Representation::Full
        );
        assert_eq!(Representation::from_accept(None), Representation::Full);
    }
}
