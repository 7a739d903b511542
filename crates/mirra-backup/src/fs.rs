use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::trace;

use crate::{
    blob::BlobStore,
    error::{BackupError, ErrorContext, Result},
};

/// Blob store rooted at a directory, one file per key.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("creating directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key onto a path below the root, refusing traversal.
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let trimmed = key.trim_start_matches('/');
        if trimmed.is_empty() {
            return Err(BackupError::InvalidKey(key.to_string()));
        }

        let mut path = self.root.clone();
        for segment in trimmed.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(BackupError::InvalidKey(key.to_string()));
            }
            path.push(segment);
        }
        Ok(path)
    }

    fn path_key(&self, path: &Path, leading_slash: bool) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        Some(if leading_slash {
            format!("/{joined}")
        } else {
            joined
        })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BackupError::KeyMissing(key.to_string()))
            }
            Err(err) => {
                Err(BackupError::IoError {
                    action: format!("reading {}", path.display()),
                    source: err,
                })
            }
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.key_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(".part");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, &bytes)
            .await
            .with_context(|| format!("writing {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("renaming {} to {}", tmp_path.display(), path.display()))?;
        trace!(key, bytes = bytes.len(), "blob written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(BackupError::KeyMissing(key.to_string()))
            }
            Err(err) => {
                Err(BackupError::IoError {
                    action: format!("removing {}", path.display()),
                    source: err,
                })
            }
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let leading_slash = prefix.starts_with('/');
        let trimmed = prefix.trim_start_matches('/');

        // Walk from the deepest directory the prefix fully names.
        let start = match trimmed.rfind('/') {
            Some(idx) => self.key_path(&trimmed[..idx])?,
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(BackupError::IoError {
                        action: format!("listing {}", dir.display()),
                        source: err,
                    })
                }
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .with_context(|| format!("listing {}", dir.display()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .with_context(|| format!("inspecting {}", path.display()))?;

                if file_type.is_dir() {
                    pending.push(path);
                } else if path.extension().is_some_and(|ext| ext == "part") {
                    continue;
                } else if let Some(key) = self.path_key(&path, leading_slash) {
                    if key.starts_with(prefix) {
                        keys.push(key);
                    }
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_fs_blob_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        store
            .put("@cnpmtest%2Fa/dist-tags/latest", b"1.0.0".to_vec())
            .await
            .unwrap();
        store
            .put("@cnpmtest%2Fa/package-files/1.0.0.json", b"{}".to_vec())
            .await
            .unwrap();

        assert_eq!(
            store.get("@cnpmtest%2Fa/dist-tags/latest").await.unwrap(),
            b"1.0.0"
        );
        assert_eq!(
            store.list("@cnpmtest%2Fa/dist-tags/").await.unwrap(),
            vec!["@cnpmtest%2Fa/dist-tags/latest"]
        );
        assert_eq!(store.list("@cnpmtest%2Fa/").await.unwrap().len(), 2);
        assert!(store.list("missing/dist-tags/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fs_blob_store_missing_keys() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.get("a/dist-tags/latest").await,
            Err(BackupError::KeyMissing(_))
        ));
        assert!(matches!(
            store.remove("a/dist-tags/latest").await,
            Err(BackupError::KeyMissing(_))
        ));
    }

    #[tokio::test]
    async fn test_fs_blob_store_tarball_keys() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        store
            .put("/@sindresorhus/df/-/df-1.0.1.tgz", vec![1, 2, 3])
            .await
            .unwrap();
        assert!(dir
            .path()
            .join("@sindresorhus/df/-/df-1.0.1.tgz")
            .exists());
        assert_eq!(
            store.list("/@sindresorhus/df/-/").await.unwrap(),
            vec!["/@sindresorhus/df/-/df-1.0.1.tgz"]
        );
    }

    #[tokio::test]
    async fn test_fs_blob_store_rejects_traversal() {
        let dir = tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).await.unwrap();

        for key in ["", "/", "../escape", "a/../../b", "a//b"] {
            assert!(matches!(
                store.put(key, Vec::new()).await,
                Err(BackupError::InvalidKey(_))
            ));
        }
    }
}
