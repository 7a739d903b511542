//! JSON-file implementation of every store contract.
//!
//! Layout under the root directory:
//!
//! ```text
//! packages/<encoded name>.json   one PackageState per package
//! users/<encoded name>.json      one LocalUser per account
//! logs/<encoded log id>.log      newline separated run log
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mirra_registry::{AbbreviatedVersion, DistTags, UnpublishRecord, VersionRecord};
use mirra_utils::name::encode_segment;
use serde::{de::DeserializeOwned, Serialize};
use tokio::{fs, io::AsyncWriteExt, sync::Mutex};
use tracing::trace;

use crate::{
    error::{ErrorContext, Result, StoreError},
    model::{LocalUser, PackageState},
    traits::{PackageStore, SyncLogStore, UserStore},
};

/// Store persisted as JSON files under a directory.
///
/// Writes within one process are serialized; the files are not meant to be
/// shared between processes.
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in ["packages", "users", "logs"] {
            let path = root.join(dir);
            fs::create_dir_all(&path)
                .await
                .with_context(|| format!("creating directory {}", path.display()))?;
        }

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn package_path(&self, name: &str) -> PathBuf {
        self.root
            .join("packages")
            .join(format!("{}.json", encode_segment(name)))
    }

    fn user_path(&self, name: &str) -> PathBuf {
        self.root
            .join("users")
            .join(format!("{}.json", encode_segment(name)))
    }

    fn log_path(&self, log_id: &str) -> PathBuf {
        self.root
            .join("logs")
            .join(format!("{}.log", encode_segment(log_id)))
    }

    async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StoreError::IoError {
                    action: format!("reading {}", path.display()),
                    source: err,
                })
            }
        };

        serde_json::from_slice(&bytes).map(Some).map_err(|err| {
            StoreError::Corrupted {
                path: path.display().to_string(),
                reason: err.to_string(),
            }
        })
    }

    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp_path = path.with_extension("json.part");

        fs::write(&tmp_path, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;
        trace!(path = %path.display(), bytes = bytes.len(), "record written");
        Ok(())
    }

    async fn remove_file(path: &Path) -> Result<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => {
                Err(StoreError::IoError {
                    action: format!("removing {}", path.display()),
                    source: err,
                })
            }
        }
    }

    async fn load_package(&self, name: &str) -> Result<PackageState> {
        Ok(Self::load_json(&self.package_path(name))
            .await?
            .unwrap_or_default())
    }

    async fn update_package<R: Send>(
        &self,
        name: &str,
        f: impl FnOnce(&mut PackageState) -> R + Send,
    ) -> Result<R> {
        let _guard = self.write_lock.lock().await;
        let path = self.package_path(name);

        let mut state = self.load_package(name).await?;
        let out = f(&mut state);

        if state.is_empty() {
            Self::remove_file(&path).await?;
        } else {
            Self::write_json(&path, &state).await?;
        }
        Ok(out)
    }
}

#[async_trait]
impl PackageStore for FileStore {
    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(!self.load_package(name).await?.versions.is_empty())
    }

    async fn list_versions(&self, name: &str) -> Result<Vec<VersionRecord>> {
        Ok(self.load_package(name).await?.versions.into_values().collect())
    }

    async fn save_version(&self, record: VersionRecord) -> Result<()> {
        let name = record.name.clone();
        self.update_package(&name, |state| {
            state.versions.insert(record.version.clone(), record);
        })
        .await
    }

    async fn remove_versions(&self, name: &str, versions: &[String]) -> Result<()> {
        self.update_package(name, |state| {
            for version in versions {
                state.versions.remove(version);
                state.abbreviated.remove(version);
            }
        })
        .await
    }

    async fn list_abbreviated(&self, name: &str) -> Result<Vec<AbbreviatedVersion>> {
        Ok(self
            .load_package(name)
            .await?
            .abbreviated
            .into_values()
            .collect())
    }

    async fn save_abbreviated(&self, record: AbbreviatedVersion) -> Result<()> {
        let name = record.name.clone();
        self.update_package(&name, |state| {
            state.abbreviated.insert(record.version.clone(), record);
        })
        .await
    }

    async fn list_tags(&self, name: &str) -> Result<DistTags> {
        Ok(self.load_package(name).await?.tags)
    }

    async fn set_tag(&self, name: &str, tag: &str, version: &str) -> Result<()> {
        self.update_package(name, |state| {
            state.tags.insert(tag.to_string(), version.to_string());
        })
        .await
    }

    async fn remove_tag(&self, name: &str, tag: &str) -> Result<()> {
        self.update_package(name, |state| {
            state.tags.remove(tag);
        })
        .await
    }

    async fn get_unpublished(&self, name: &str) -> Result<Option<UnpublishRecord>> {
        Ok(self.load_package(name).await?.unpublished)
    }

    async fn save_unpublished(&self, record: UnpublishRecord) -> Result<()> {
        let name = record.name.clone();
        self.update_package(&name, |state| state.unpublished = Some(record))
            .await
    }

    async fn clear_unpublished(&self, name: &str) -> Result<()> {
        self.update_package(name, |state| state.unpublished = None)
            .await
    }

    async fn remove_package(&self, name: &str) -> Result<()> {
        self.update_package(name, |state| {
            state.versions.clear();
            state.abbreviated.clear();
            state.tags.clear();
        })
        .await
    }
}

#[async_trait]
impl UserStore for FileStore {
    async fn get_user(&self, name: &str) -> Result<Option<LocalUser>> {
        Self::load_json(&self.user_path(name)).await
    }

    async fn save_user(&self, user: LocalUser) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        Self::write_json(&self.user_path(&user.name), &user).await
    }

    async fn delete_user(&self, name: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        Self::remove_file(&self.user_path(name)).await
    }
}

#[async_trait]
impl SyncLogStore for FileStore {
    async fn append(&self, log_id: &str, line: &str) -> Result<()> {
        let path = self.log_path(log_id);
        let _guard = self.write_lock.lock().await;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .with_context(|| format!("appending to {}", path.display()))?;
        Ok(())
    }

    async fn read(&self, log_id: &str) -> Result<Vec<String>> {
        let path = self.log_path(log_id);
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content.lines().map(str::to_string).collect()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => {
                Err(StoreError::IoError {
                    action: format!("reading {}", path.display()),
                    source: err,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_package_state_persists_across_instances() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).await.unwrap();
            let mut record = VersionRecord::new("@cnpmtest/a", "1.0.0");
            record.deprecated = Some("old".into());
            store.save_version(record).await.unwrap();
            store.set_tag("@cnpmtest/a", "latest", "1.0.0").await.unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.exists("@cnpmtest/a").await.unwrap());
        let versions = store.list_versions("@cnpmtest/a").await.unwrap();
        assert_eq!(versions[0].deprecated.as_deref(), Some("old"));
        assert!(dir
            .path()
            .join("packages")
            .join("@cnpmtest%2Fa.json")
            .exists());
    }

    #[tokio::test]
    async fn test_empty_package_file_is_removed() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.set_tag("pedding", "latest", "1.0.0").await.unwrap();
        let path = store.package_path("pedding");
        assert!(path.exists());

        store.remove_tag("pedding", "latest").await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupted_file_is_reported() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        std::fs::write(store.package_path("broken"), b"{not json").unwrap();

        assert!(matches!(
            store.list_versions("broken").await,
            Err(StoreError::Corrupted { .. })
        ));
    }

    #[tokio::test]
    async fn test_users_and_logs() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store
            .save_user(LocalUser {
                name: "fengmk2".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(store.get_user("fengmk2").await.unwrap().is_some());
        assert!(store.delete_user("fengmk2").await.unwrap());
        assert!(store.get_user("fengmk2").await.unwrap().is_none());

        store.append("run/1", "[pedding] synced").await.unwrap();
        store.append("run/1", "end").await.unwrap();
        assert_eq!(
            store.read("run/1").await.unwrap(),
            vec!["[pedding] synced", "end"]
        );
    }
}
